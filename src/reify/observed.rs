//! In-process reification through an observing engine.

use crate::engine::{GroundContext, ObservedGrounder};
use crate::error::ReifyResult;
use crate::program::ObservedProgram;

use super::{compile, MetaFactBase, OutputDialect, Reifier};

/// Grounds program text in a fresh engine instance, records every ground
/// statement, and compiles the observations.
pub struct InProcessReifier<G> {
    grounder: G,
}

impl<G: ObservedGrounder> InProcessReifier<G> {
    pub fn new(grounder: G) -> Self {
        Self { grounder }
    }
}

impl<G: ObservedGrounder> Reifier for InProcessReifier<G> {
    fn reify(
        &mut self,
        program: &str,
        context: &mut dyn GroundContext,
        prefix: &str,
    ) -> ReifyResult<MetaFactBase> {
        let mut observed = ObservedProgram::new();
        self.grounder
            .ground_observed(program, context, &mut observed)?;
        tracing::debug!(statements = observed.len(), prefix, "observed grounding");
        Ok(compile(&observed, prefix))
    }

    fn dialect(&self) -> OutputDialect {
        OutputDialect::Atom
    }
}
