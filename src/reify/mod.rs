//! Meta-program compiler: reification of ground programs into facts.
//!
//! A ground program is turned into a uniform fact base (`rule/2`,
//! `atom_tuple/1,2`, `literal_tuple/1,2`, `weighted_literal_tuple/1,3`,
//! `scc/2`, `output/2`, `output_term/2`), followed by the meta-interpreter
//! that evaluates it. All predicates carry a caller-chosen prefix so that
//! several reified programs can coexist in one solving process.
//!
//! Two realizations sit behind [`Reifier`]:
//!
//! - [`observed::InProcessReifier`] grounds through an engine that reports
//!   every ground statement and compiles the observations with [`compile`],
//! - [`external::ExternalReifier`] pipes program text through a clingo
//!   binary and prefixes its output.
//!
//! [`canonical`] normalises either output for comparison.

pub mod canonical;
pub mod external;
pub mod observed;
pub mod template;

use std::fmt::Write;

use crate::engine::GroundContext;
use crate::error::ReifyResult;
use crate::graph::DependencyGraph;
use crate::program::{GroundRule, ObservedProgram, OutputAtom, OutputTerm, WeightedRule};

use self::template::{Template, META_INTERPRETER};

/// How `output/2` facts refer to their condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDialect {
    /// `output(Symbol, Atom)`, as produced by [`compile`].
    Atom,
    /// `output(Symbol, LiteralTuple)`, as produced by the clingo reifier.
    LiteralTuple,
}

/// A reified program: facts followed by the prefixed meta-interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaFactBase {
    text: String,
    facts_end: usize,
    prefix: String,
    dialect: OutputDialect,
}

impl MetaFactBase {
    /// Assemble a fact base from reified facts; appends the interpreter.
    pub fn new(facts: String, prefix: &str, dialect: OutputDialect) -> Self {
        let facts_end = facts.len();
        let mut text = facts;
        text.push_str(&interpreter(prefix));
        Self {
            text,
            facts_end,
            prefix: prefix.to_string(),
            dialect,
        }
    }

    /// The complete program text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Only the reified facts, without the interpreter.
    pub fn facts(&self) -> &str {
        &self.text[..self.facts_end]
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dialect(&self) -> OutputDialect {
        self.dialect
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// The meta-interpreter rendered into `prefix`.
pub fn interpreter(prefix: &str) -> String {
    Template::parse(META_INTERPRETER).render_in(prefix)
}

/// Reifies program text under a prefix.
pub trait Reifier {
    fn reify(
        &mut self,
        program: &str,
        context: &mut dyn GroundContext,
        prefix: &str,
    ) -> ReifyResult<MetaFactBase>;

    fn dialect(&self) -> OutputDialect;
}

/// Compile observed ground statements into a prefixed meta fact base.
pub fn compile(program: &ObservedProgram, prefix: &str) -> MetaFactBase {
    let mut pass = CompilationPass::new(prefix);
    pass.fact_zero();
    for rule in &program.rules {
        pass.rule(rule);
    }
    for rule in &program.weighted_rules {
        pass.weighted_rule(rule);
    }
    pass.sccs();
    for output in &program.output_atoms {
        pass.output_atom(output);
    }
    for output in &program.output_terms {
        pass.output_term(output);
    }
    tracing::debug!(
        prefix,
        rules = program.rules.len(),
        weighted_rules = program.weighted_rules.len(),
        atoms = pass.graph.atom_count(),
        "compiled meta fact base"
    );
    MetaFactBase::new(pass.out, prefix, OutputDialect::Atom)
}

/// State of one compilation: output buffer, tuple numbering, dependencies.
struct CompilationPass<'a> {
    prefix: &'a str,
    out: String,
    next_literal_tuple: u32,
    next_weighted_tuple: u32,
    next_atom_tuple: u32,
    graph: DependencyGraph,
}

impl<'a> CompilationPass<'a> {
    fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            out: String::new(),
            next_literal_tuple: 1,
            next_weighted_tuple: 1,
            next_atom_tuple: 1,
            graph: DependencyGraph::new(),
        }
    }

    /// Tuple id 0 is reserved for the unconditional group.
    fn fact_zero(&mut self) {
        let p = self.prefix;
        let _ = writeln!(
            self.out,
            "{p}rule(disjunction(0),normal(0)). {p}atom_tuple(0). {p}atom_tuple(0,0). {p}literal_tuple(0).\n"
        );
    }

    fn head(&mut self, choice: bool, head: &[crate::program::AtomId]) -> (u32, &'static str) {
        let p = self.prefix;
        let id = self.next_atom_tuple;
        self.next_atom_tuple += 1;
        let _ = write!(self.out, "{p}atom_tuple({id}).");
        for atom in head {
            let _ = write!(self.out, " {p}atom_tuple({id},{atom}).");
        }
        self.out.push('\n');
        (id, if choice { "choice" } else { "disjunction" })
    }

    fn rule(&mut self, rule: &GroundRule) {
        let p = self.prefix;
        let body = self.next_literal_tuple;
        self.next_literal_tuple += 1;

        let _ = write!(self.out, "{p}literal_tuple({body}).");
        for literal in &rule.body {
            let _ = write!(self.out, " {p}literal_tuple({body},{literal}).");
        }
        self.out.push('\n');

        let (head, kind) = self.head(rule.choice, &rule.head);
        let _ = writeln!(self.out, "{p}rule({kind}({head}),normal({body})).\n");

        self.graph.add_rule(&rule.head, &rule.body);
    }

    fn weighted_rule(&mut self, rule: &WeightedRule) {
        let p = self.prefix;
        let body = self.next_weighted_tuple;
        self.next_weighted_tuple += 1;

        let _ = write!(self.out, "{p}weighted_literal_tuple({body}).");
        for (literal, weight) in &rule.body {
            let _ = write!(self.out, " {p}weighted_literal_tuple({body},{literal},{weight}).");
        }
        self.out.push('\n');

        let (head, kind) = self.head(rule.choice, &rule.head);
        let _ = writeln!(
            self.out,
            "{p}rule({kind}({head}),sum({body},{})).\n",
            rule.lower_bound
        );

        self.graph
            .add_rule(&rule.head, rule.body.iter().map(|(literal, _)| literal));
    }

    fn sccs(&mut self) {
        let reified = self.graph.reify_sccs(self.prefix);
        self.out.push_str(&reified);
        self.out.push('\n');
    }

    fn output_atom(&mut self, output: &OutputAtom) {
        let _ = writeln!(
            self.out,
            "{}output({},{}).",
            self.prefix, output.symbol, output.atom
        );
    }

    fn output_term(&mut self, output: &OutputTerm) {
        match output.condition.first() {
            Some(literal) => {
                let _ = writeln!(
                    self.out,
                    "{}output_term({},{literal}).",
                    self.prefix, output.symbol
                );
            }
            None => {
                tracing::warn!(symbol = %output.symbol, "output term without condition, skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{AtomId, Literal, ProgramObserver};
    use crate::term::Term;

    fn loop_program() -> ObservedProgram {
        // a=1, b=2, c=3: a :- b. b :- a. b :- c. a :- c. {c}.
        let mut p = ObservedProgram::new();
        p.on_rule(true, &[AtomId(3)], &[]);
        p.on_rule(false, &[AtomId(1)], &[Literal(2)]);
        p.on_rule(false, &[AtomId(2)], &[Literal(1)]);
        p.on_rule(false, &[AtomId(2)], &[Literal(3)]);
        p.on_rule(false, &[AtomId(1)], &[Literal(3)]);
        for (name, atom) in [("a", 1), ("b", 2), ("c", 3)] {
            p.on_output_atom(&Term::constant(name), AtomId(atom));
        }
        p
    }

    #[test]
    fn fact_zero_is_always_emitted() {
        let base = compile(&ObservedProgram::new(), "_");
        assert!(base.facts().starts_with("_rule(disjunction(0),normal(0))."));
        assert!(base.facts().contains("_literal_tuple(0)."));
    }

    #[test]
    fn normal_rules_get_fresh_tuples() {
        let base = compile(&loop_program(), "_");
        let facts = base.facts();
        assert!(facts.contains("_literal_tuple(1)."));
        assert!(facts.contains("_rule(choice(1),normal(1))."));
        assert!(facts.contains("_atom_tuple(1,3)."));
        assert!(facts.contains("_literal_tuple(2,2)."));
        assert!(facts.contains("_rule(disjunction(2),normal(2))."));
        assert!(facts.contains("_rule(disjunction(5),normal(5))."));
        assert!(!facts.contains("_rule(disjunction(6)"));
    }

    #[test]
    fn weighted_rules_use_sum_bodies() {
        let mut p = ObservedProgram::new();
        p.on_weighted_rule(false, &[AtomId(4)], 2, &[(Literal(1), 1), (Literal(-2), 3)]);
        let facts = compile(&p, "__").facts().to_string();
        assert!(facts.contains("__weighted_literal_tuple(1,1,1)."));
        assert!(facts.contains("__weighted_literal_tuple(1,-2,3)."));
        assert!(facts.contains("__rule(disjunction(1),sum(1,2))."));
    }

    #[test]
    fn loops_and_outputs_follow_rules() {
        let base = compile(&loop_program(), "_");
        let facts = base.facts();
        assert!(facts.contains("_scc(0,1)."));
        assert!(facts.contains("_scc(0,2)."));
        assert!(!facts.contains("_scc(1,3)."));
        assert!(facts.contains("_output(a,1)."));
        let scc_at = facts.find("_scc(").unwrap();
        let output_at = facts.find("_output(").unwrap();
        assert!(scc_at < output_at);
    }

    #[test]
    fn interpreter_follows_facts_with_same_prefix() {
        let base = compile(&loop_program(), "___");
        assert!(base.as_str().len() > base.facts().len());
        let tail = &base.as_str()[base.facts().len()..];
        assert!(tail.contains("___bot :-"));
        assert_eq!(base.dialect(), OutputDialect::Atom);
    }

    #[test]
    fn output_terms_reference_first_condition_literal() {
        let mut p = ObservedProgram::new();
        p.on_output_term(&Term::function("_holds_at_zero", vec![Term::constant("a")]), &[Literal(7)]);
        p.on_output_term(&Term::constant("skipped"), &[]);
        let facts = compile(&p, "_").facts().to_string();
        assert!(facts.contains("_output_term(_holds_at_zero(a),7)."));
        assert!(!facts.contains("skipped"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let first = compile(&loop_program(), "_");
        let second = compile(&loop_program(), "_");
        assert_eq!(first, second);
    }
}
