//! Per-iteration model snapshots and the controller's run state.

use std::collections::BTreeSet;

use crate::engine::Model;
use crate::error::{ControlError, ControlResult};
use crate::term::Term;

use super::programs::ControlNames;

/// The model found in one solving iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationState {
    pub step: u32,
    /// Holds-domain atoms true in the model.
    pub holds: BTreeSet<Term>,
    /// Holds-domain atoms false in the model.
    pub nholds: BTreeSet<Term>,
    /// Shown symbols, minus the holds projection.
    pub shown: Vec<Term>,
    pub models: u64,
    pub opt_models: u64,
    pub more_models: bool,
}

impl IterationState {
    /// Split a model into its holds projection and its shown symbols.
    pub fn capture(step: u32, model: &Model, names: &ControlNames) -> Self {
        let mut state = Self {
            step,
            more_models: true,
            ..Default::default()
        };
        for symbol in &model.shown {
            if names.is_holds_at_zero(symbol) {
                state.holds.insert(symbol.arguments()[0].clone());
            } else {
                state.shown.push(symbol.clone());
            }
        }
        for symbol in &model.complement {
            if names.is_holds_at_zero(symbol) {
                state.nholds.insert(symbol.arguments()[0].clone());
            }
        }
        state
    }
}

/// Mutable state of one optimization run, owned by the controller.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Step of the current iteration; the first model is step 1.
    pub step: u32,
    /// Latest model, with the run's counters.
    pub current: IterationState,
    old_holds: Option<BTreeSet<Term>>,
    old_nholds: Option<BTreeSet<Term>>,
    /// Steps whose improvement constraint is active.
    pub improving: Vec<u32>,
    /// No model was found since the last optimum.
    pub since_optimum: bool,
    /// The approximation phase has not been exhausted yet.
    pub approx_active: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            step: 0,
            current: IterationState {
                more_models: true,
                ..Default::default()
            },
            old_holds: None,
            old_nholds: None,
            improving: Vec::new(),
            since_optimum: false,
            approx_active: false,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn models(&self) -> u64 {
        self.current.models
    }

    pub fn opt_models(&self) -> u64 {
        self.current.opt_models
    }

    pub fn more_models(&self) -> bool {
        self.current.more_models
    }

    /// Replace the current snapshot with a new model, carrying the counters.
    pub fn record_model(&mut self, mut next: IterationState) -> &IterationState {
        next.models = self.current.models + 1;
        next.opt_models = self.current.opt_models;
        next.more_models = self.current.more_models;
        self.current = next;
        &self.current
    }

    /// Fail when the current model repeats the previous one.
    pub fn check_last_model(&mut self) -> ControlResult<()> {
        let same = self.old_holds.as_ref() == Some(&self.current.holds)
            && self.old_nholds.as_ref() == Some(&self.current.nholds);
        if same {
            return Err(ControlError::SameModel {
                step: self.current.step,
            });
        }
        self.old_holds = Some(self.current.holds.clone());
        self.old_nholds = Some(self.current.nholds.clone());
        Ok(())
    }

    pub fn count_optimum(&mut self) {
        self.current.opt_models += 1;
    }

    /// Count an enumerated tie as both a model and an optimum.
    pub fn count_tie(&mut self) -> u64 {
        self.current.models += 1;
        self.current.opt_models += 1;
        self.current.models
    }

    pub fn set_more_models(&mut self, more: bool) {
        self.current.more_models = more;
    }
}
