//! Solving-engine seam.
//!
//! The controller and the in-process reifier talk to an answer-set solving
//! engine only through the traits in this module. An adapter for a concrete
//! engine implements [`SolvingEngine`] (and [`ObservedGrounder`] when it can
//! report ground statements); tests use a scripted fake.

use std::fmt;

use crate::error::EngineResult;
use crate::program::ProgramObserver;
use crate::term::Term;

/// A named program part with actual parameters, ready for grounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramPart {
    pub name: String,
    pub params: Vec<Term>,
}

impl ProgramPart {
    pub fn new(name: impl Into<String>, params: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// A part without parameters.
    pub fn nullary(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// A part parameterized by model steps, e.g. `preference(0,3)`.
    pub fn steps(name: impl Into<String>, steps: &[u32]) -> Self {
        Self::new(
            name,
            steps.iter().map(|&s| Term::Number(i64::from(s))).collect(),
        )
    }
}

impl fmt::Display for ProgramPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

/// Source of external functions (`@name(args)`) evaluated during grounding.
pub trait GroundContext {
    /// Evaluate `name(args)`. `None` means the function is unknown.
    fn call(&mut self, name: &str, args: &[Term]) -> Option<Vec<Term>>;
}

/// A context that defines no functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl GroundContext for NoContext {
    fn call(&mut self, _name: &str, _args: &[Term]) -> Option<Vec<Term>> {
        None
    }
}

/// One stable model as seen by the model callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    /// Shown atoms and terms that hold.
    pub shown: Vec<Term>,
    /// Shown terms whose condition does not hold.
    pub complement: Vec<Term>,
}

/// Result of one solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Satisfiable,
    Unsatisfiable,
    /// Interrupted without a definite answer.
    Unknown,
}

/// Grounding and solving operations the controller relies on.
pub trait SolvingEngine {
    /// Add a program part with formal parameter names.
    fn add(&mut self, name: &str, params: &[&str], program: &str) -> EngineResult<()>;

    /// Instantiate the given parts; `context` answers external function calls.
    fn ground(&mut self, parts: &[ProgramPart], context: &mut dyn GroundContext) -> EngineResult<()>;

    /// Search for models under `assumptions`, invoking `on_model` for each one.
    fn solve(
        &mut self,
        assumptions: &[(Term, bool)],
        on_model: &mut dyn FnMut(&Model),
    ) -> EngineResult<SolveOutcome>;

    /// Fix the truth value of a declared external atom.
    fn assign_external(&mut self, atom: &Term, truth: bool) -> EngineResult<()>;

    /// Make a declared external permanently false; its declaration stays.
    fn release_external(&mut self, atom: &Term) -> EngineResult<()>;

    /// Ground atoms with the given signature.
    fn atoms_by_signature(&self, name: &str, arity: usize) -> Vec<Term>;

    /// Maximum number of models one solve call reports (0 = all).
    fn model_limit(&self) -> u64;

    fn set_model_limit(&mut self, limit: u64);
}

/// Engines that can ground a standalone program and report every ground
/// statement to an observer.
pub trait ObservedGrounder {
    fn ground_observed(
        &mut self,
        program: &str,
        context: &mut dyn GroundContext,
        observer: &mut dyn ProgramObserver,
    ) -> EngineResult<()>;
}
