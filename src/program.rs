//! Ground program statements as reported by the engine during grounding.
//!
//! The engine integration layer forwards every ground statement to a
//! [`ProgramObserver`]. [`ObservedProgram`] is the buffering observer used by
//! the meta-program compiler: it records statements in arrival order for one
//! compilation pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::term::Term;

/// Identifier of a ground atom inside the engine (always positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AtomId(pub u32);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed atom: positive for the atom, negative for its default negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Literal(pub i32);

impl Literal {
    /// The positive literal of `atom`.
    pub fn pos(atom: AtomId) -> Self {
        Literal(atom.0 as i32)
    }

    /// The negative literal of `atom`.
    pub fn neg(atom: AtomId) -> Self {
        Literal(-(atom.0 as i32))
    }

    /// Whether this literal is non-negated.
    pub fn is_positive(self) -> bool {
        self.0 >= 0
    }

    /// The underlying atom.
    pub fn atom(self) -> AtomId {
        AtomId(self.0.unsigned_abs())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normal, choice, or disjunctive rule: `head :- body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundRule {
    pub choice: bool,
    pub head: Vec<AtomId>,
    pub body: Vec<Literal>,
}

/// A rule whose body is a lower-bounded weighted sum of literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedRule {
    pub choice: bool,
    pub head: Vec<AtomId>,
    pub lower_bound: i32,
    pub body: Vec<(Literal, i32)>,
}

/// Associates a shown symbol with the atom that represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAtom {
    pub symbol: Term,
    pub atom: AtomId,
}

/// Associates a shown term with the condition under which it is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTerm {
    pub symbol: Term,
    pub condition: Vec<Literal>,
}

/// Event sink for ground statements produced while the engine grounds.
pub trait ProgramObserver {
    fn on_rule(&mut self, choice: bool, head: &[AtomId], body: &[Literal]);

    fn on_weighted_rule(
        &mut self,
        choice: bool,
        head: &[AtomId],
        lower_bound: i32,
        body: &[(Literal, i32)],
    );

    fn on_output_atom(&mut self, symbol: &Term, atom: AtomId);

    fn on_output_term(&mut self, symbol: &Term, condition: &[Literal]);
}

/// Statements collected during one grounding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedProgram {
    pub rules: Vec<GroundRule>,
    pub weighted_rules: Vec<WeightedRule>,
    pub output_atoms: Vec<OutputAtom>,
    pub output_terms: Vec<OutputTerm>,
}

impl ObservedProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded statements.
    pub fn len(&self) -> usize {
        self.rules.len() + self.weighted_rules.len() + self.output_atoms.len() + self.output_terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.rules.clear();
        self.weighted_rules.clear();
        self.output_atoms.clear();
        self.output_terms.clear();
    }
}

impl ProgramObserver for ObservedProgram {
    fn on_rule(&mut self, choice: bool, head: &[AtomId], body: &[Literal]) {
        self.rules.push(GroundRule {
            choice,
            head: head.to_vec(),
            body: body.to_vec(),
        });
    }

    fn on_weighted_rule(
        &mut self,
        choice: bool,
        head: &[AtomId],
        lower_bound: i32,
        body: &[(Literal, i32)],
    ) {
        self.weighted_rules.push(WeightedRule {
            choice,
            head: head.to_vec(),
            lower_bound,
            body: body.to_vec(),
        });
    }

    fn on_output_atom(&mut self, symbol: &Term, atom: AtomId) {
        self.output_atoms.push(OutputAtom {
            symbol: symbol.clone(),
            atom,
        });
    }

    fn on_output_term(&mut self, symbol: &Term, condition: &[Literal]) {
        self.output_terms.push(OutputTerm {
            symbol: symbol.clone(),
            condition: condition.to_vec(),
        });
    }
}
