//! Volatile externals: one retractable atom per compared pair of steps.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::SolvingEngine;
use crate::error::EngineResult;
use crate::term::Term;

use super::programs::ControlNames;

/// Memoized `volatile(m(a),m(b))` atoms and their activation state.
#[derive(Debug, Clone)]
pub struct VolatileExternals {
    names: ControlNames,
    atoms: BTreeMap<(u32, u32), Term>,
    active: BTreeSet<(u32, u32)>,
}

impl VolatileExternals {
    pub fn new(names: ControlNames) -> Self {
        Self {
            names,
            atoms: BTreeMap::new(),
            active: BTreeSet::new(),
        }
    }

    /// The atom for `(a, b)`, created on first use.
    pub fn get(&mut self, a: u32, b: u32) -> &Term {
        let names = &self.names;
        self.atoms
            .entry((a, b))
            .or_insert_with(|| names.volatile(a, b))
    }

    /// Assign the external true.
    pub fn activate(&mut self, engine: &mut dyn SolvingEngine, a: u32, b: u32) -> EngineResult<()> {
        let atom = self.get(a, b).clone();
        engine.assign_external(&atom, true)?;
        self.active.insert((a, b));
        tracing::debug!(%atom, "volatile external activated");
        Ok(())
    }

    /// Release the external; its declaration stays with the engine.
    pub fn release(&mut self, engine: &mut dyn SolvingEngine, a: u32, b: u32) -> EngineResult<()> {
        let atom = self.get(a, b).clone();
        engine.release_external(&atom)?;
        self.active.remove(&(a, b));
        tracing::debug!(%atom, "volatile external released");
        Ok(())
    }

    pub fn is_active(&self, a: u32, b: u32) -> bool {
        self.active.contains(&(a, b))
    }

    /// Number of distinct atoms created so far.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
