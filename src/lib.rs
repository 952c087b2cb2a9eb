// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # qualopt
//!
//! Qualitative multi-criteria optimization over an answer-set solving engine.
//! Stable models of a base program are candidates; a separately specified
//! preference relation orders them, and the controller searches for optimal
//! models without modifying the engine.
//!
//! ## Architecture
//!
//! - **Dependency graph** (`graph`): positive atom dependencies and their SCCs via petgraph
//! - **Meta-program compiler** (`reify`): reification of ground programs into prefixed facts,
//!   in process or through a clingo binary
//! - **Meta programs** (`meta`): reified base + reified preference + binding
//! - **Controller** (`control`): the solve/ground state machine with volatile improvement
//!   constraints, optimum handling and tie enumeration
//! - **Engine seam** (`engine`): traits a concrete solving engine adapter implements
//!
//! ## Library usage
//!
//! ```
//! use qualopt::program::{AtomId, Literal, ObservedProgram, ProgramObserver};
//! use qualopt::reify::compile;
//! use qualopt::term::Term;
//!
//! // a :- b. b :- a. {b}.
//! let mut program = ObservedProgram::new();
//! program.on_rule(false, &[AtomId(1)], &[Literal(2)]);
//! program.on_rule(false, &[AtomId(2)], &[Literal(1)]);
//! program.on_rule(true, &[AtomId(2)], &[]);
//! program.on_output_atom(&Term::constant("a"), AtomId(1));
//!
//! let base = compile(&program, "__");
//! assert!(base.facts().contains("__scc(0,1)."));
//! ```

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod graph;
pub mod meta;
pub mod program;
pub mod reify;
pub mod term;
