//! Auxiliary control programs and the names the controller grounds.
//!
//! The preference parts (`preference`, `preference_base`, `approx`) come
//! from the preference compiler and are only referenced here by name.

use crate::engine::ProgramPart;
use crate::reify::template::Template;
use crate::term::Term;

pub const DO_HOLDS_AT_ZERO: &str = "do_holds_at_zero";
pub const DO_HOLDS: &str = "do_holds";
pub const OPEN_HOLDS: &str = "open_holds";
pub const VOLATILE_FACT: &str = "volatile_fact";
pub const VOLATILE_EXTERNAL: &str = "volatile_external";
pub const DELETE_MODEL: &str = "delete_model";
pub const UNSAT_PROGRAM: &str = "unsat";
pub const NOT_UNSAT_PROGRAM: &str = "not_unsat";
pub const PREFERENCE: &str = "preference";
pub const PREFERENCE_BASE: &str = "preference_base";
pub const APPROX: &str = "approx";
pub const METASP: &str = "metasp";

// Predicate names, all placed in the control namespace.
pub const HOLDS: &str = "holds";
pub const HOLDS_AT_ZERO: &str = "holds_at_zero";
pub const VOLATILE: &str = "volatile";
pub const MODEL: &str = "m";
pub const ERROR: &str = "_error";

/// A program part the controller adds to the engine at start.
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryProgram {
    pub name: &'static str,
    pub params: &'static [&'static str],
    source: &'static str,
}

impl AuxiliaryProgram {
    /// Program text with every control predicate in `namespace`.
    pub fn render(&self, namespace: &str) -> String {
        Template::parse(self.source).render_in(namespace)
    }
}

pub const AUXILIARY_PROGRAMS: [AuxiliaryProgram; 8] = [
    AuxiliaryProgram {
        name: DO_HOLDS_AT_ZERO,
        params: &[],
        source: "#show ^holds_at_zero(X) : ^holds(X,0).",
    },
    AuxiliaryProgram {
        name: DO_HOLDS,
        params: &["m"],
        source: "^holds(X,m) :- X = @getHolds().",
    },
    AuxiliaryProgram {
        name: OPEN_HOLDS,
        params: &["m"],
        source: "{ ^holds(X,m) } :- X = @getHolds().\n{ ^holds(X,m) } :- X = @getNHolds().",
    },
    AuxiliaryProgram {
        name: VOLATILE_FACT,
        params: &["m1", "m2"],
        source: "^volatile(^m(m1),^m(m2)).",
    },
    AuxiliaryProgram {
        name: VOLATILE_EXTERNAL,
        params: &["m1", "m2"],
        source: "#external ^volatile(^m(m1),^m(m2)).",
    },
    AuxiliaryProgram {
        name: DELETE_MODEL,
        params: &[],
        source: ":-     ^holds(X,0) : X = @getHolds();\n   not ^holds(X,0) : X = @getNHolds().",
    },
    AuxiliaryProgram {
        name: UNSAT_PROGRAM,
        params: &["m1", "m2"],
        source: ":- not ^unsat(^m(m1),^m(m2)),\n       ^volatile(^m(m1),^m(m2)).",
    },
    AuxiliaryProgram {
        name: NOT_UNSAT_PROGRAM,
        params: &["m1", "m2"],
        source: ":-     ^unsat(^m(m1),^m(m2)),\n       ^volatile(^m(m1),^m(m2)).",
    },
];

/// Control-namespace term names.
#[derive(Debug, Clone)]
pub struct ControlNames {
    namespace: String,
}

impl ControlNames {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self, predicate: &str) -> String {
        format!("{}{predicate}", self.namespace)
    }

    /// `holds(X,step)`.
    pub fn holds(&self, atom: Term, step: u32) -> Term {
        Term::function(self.name(HOLDS), vec![atom, Term::Number(i64::from(step))])
    }

    /// `volatile(m(a),m(b))`.
    pub fn volatile(&self, a: u32, b: u32) -> Term {
        let model = |s: u32| Term::function(self.name(MODEL), vec![Term::Number(i64::from(s))]);
        Term::function(self.name(VOLATILE), vec![model(a), model(b)])
    }

    /// The assumption that switches the approximation on.
    pub fn approx(&self) -> Term {
        Term::constant(self.name(APPROX))
    }

    pub fn is_holds_at_zero(&self, term: &Term) -> bool {
        term.name()
            .and_then(|n| n.strip_prefix(self.namespace.as_str()))
            .is_some_and(|n| n == HOLDS_AT_ZERO)
            && term.arguments().len() == 1
    }

    /// Whether a shown symbol belongs to the control namespace.
    pub fn is_internal(&self, term: &Term) -> bool {
        term.to_string().starts_with(self.namespace.as_str())
    }
}

pub fn do_holds(step: u32) -> ProgramPart {
    ProgramPart::steps(DO_HOLDS, &[step])
}

pub fn open_holds(step: u32) -> ProgramPart {
    ProgramPart::steps(OPEN_HOLDS, &[step])
}

pub fn preference(m1: u32, m2: u32) -> ProgramPart {
    ProgramPart::steps(PREFERENCE, &[m1, m2])
}

pub fn unsat(m1: u32, m2: u32) -> ProgramPart {
    ProgramPart::steps(UNSAT_PROGRAM, &[m1, m2])
}

pub fn not_unsat(m1: u32, m2: u32) -> ProgramPart {
    ProgramPart::steps(NOT_UNSAT_PROGRAM, &[m1, m2])
}

pub fn volatile_fact(m1: u32, m2: u32) -> ProgramPart {
    ProgramPart::steps(VOLATILE_FACT, &[m1, m2])
}

pub fn volatile_external(m1: u32, m2: u32) -> ProgramPart {
    ProgramPart::steps(VOLATILE_EXTERNAL, &[m1, m2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programs_render_into_namespace() {
        let unsat = AUXILIARY_PROGRAMS
            .iter()
            .find(|p| p.name == UNSAT_PROGRAM)
            .unwrap();
        assert_eq!(
            unsat.render("__"),
            ":- not __unsat(__m(m1),__m(m2)),\n       __volatile(__m(m1),__m(m2))."
        );
        let show = AUXILIARY_PROGRAMS[0].render("_");
        assert_eq!(show, "#show _holds_at_zero(X) : _holds(X,0).");
    }

    #[test]
    fn parameters_stay_unprefixed() {
        for program in AUXILIARY_PROGRAMS {
            let text = program.render("_");
            for param in program.params {
                assert!(!text.contains(&format!("_{param}(")), "{}", program.name);
            }
        }
    }

    #[test]
    fn control_terms() {
        let names = ControlNames::new("_");
        assert_eq!(names.volatile(0, 3).to_string(), "_volatile(_m(0),_m(3))");
        assert_eq!(names.holds(Term::constant("a"), 0).to_string(), "_holds(a,0)");
        let h = Term::function("_holds_at_zero", vec![Term::constant("a")]);
        assert!(names.is_holds_at_zero(&h));
        assert!(names.is_internal(&h));
        assert!(!names.is_internal(&Term::constant("a")));
    }
}
