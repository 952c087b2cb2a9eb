//! Numbering-independent view of reified fact bases.
//!
//! Tuple ids and atom ids are arbitrary: two reifications of the same ground
//! program agree only up to renumbering. [`canonical_facts`] describes every
//! tuple by its content and every atom by its output symbol (or by `#<id>`
//! when the atom is not shown), which makes fact bases from [`super::compile`]
//! and from the clingo reifier directly comparable.

use std::collections::{BTreeMap, BTreeSet};

use crate::program::{AtomId, GroundRule, Literal, ObservedProgram, OutputAtom, WeightedRule};
use crate::term::Term;

use super::OutputDialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Normal(i64),
    Sum(i64, i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleFact {
    choice: bool,
    head: i64,
    body: Body,
}

/// Reified facts collected by tuple id.
#[derive(Debug, Default)]
struct FactTables {
    atom_tuples: BTreeMap<i64, BTreeSet<i64>>,
    literal_tuples: BTreeMap<i64, BTreeSet<i64>>,
    weighted_tuples: BTreeMap<i64, BTreeSet<(i64, i64)>>,
    rules: Vec<RuleFact>,
    sccs: BTreeMap<i64, BTreeSet<i64>>,
    outputs: Vec<(Term, i64)>,
    output_terms: Vec<(Term, i64)>,
}

impl FactTables {
    fn parse(text: &str, prefix: &str) -> Self {
        let mut tables = Self::default();
        for statement in statements(text) {
            if statement.contains(":-") || statement.starts_with('#') {
                continue;
            }
            let Some(fact) = Term::parse(statement) else {
                continue;
            };
            let Some(name) = fact.name().and_then(|n| n.strip_prefix(prefix)) else {
                continue;
            };
            tables.add(name, fact.arguments());
        }
        tables
    }

    fn add(&mut self, name: &str, args: &[Term]) {
        let num = |i: usize| args.get(i).and_then(Term::number);
        match (name, args.len()) {
            ("atom_tuple", 1) => {
                if let Some(t) = num(0) {
                    self.atom_tuples.entry(t).or_default();
                }
            }
            ("atom_tuple", 2) => {
                if let (Some(t), Some(a)) = (num(0), num(1)) {
                    self.atom_tuples.entry(t).or_default().insert(a);
                }
            }
            ("literal_tuple", 1) => {
                if let Some(t) = num(0) {
                    self.literal_tuples.entry(t).or_default();
                }
            }
            ("literal_tuple", 2) => {
                if let (Some(t), Some(l)) = (num(0), num(1)) {
                    self.literal_tuples.entry(t).or_default().insert(l);
                }
            }
            ("weighted_literal_tuple", 1) => {
                if let Some(t) = num(0) {
                    self.weighted_tuples.entry(t).or_default();
                }
            }
            ("weighted_literal_tuple", 3) => {
                if let (Some(t), Some(l), Some(w)) = (num(0), num(1), num(2)) {
                    self.weighted_tuples.entry(t).or_default().insert((l, w));
                }
            }
            ("rule", 2) => {
                if let Some(rule) = rule_fact(&args[0], &args[1]) {
                    self.rules.push(rule);
                }
            }
            ("scc", 2) => {
                if let (Some(c), Some(a)) = (num(0), num(1)) {
                    self.sccs.entry(c).or_default().insert(a);
                }
            }
            ("output", 2) => {
                if let Some(r) = num(1) {
                    self.outputs.push((args[0].clone(), r));
                }
            }
            ("output_term", 2) => {
                if let Some(l) = num(1) {
                    self.output_terms.push((args[0].clone(), l));
                }
            }
            _ => {}
        }
    }

    /// Whether a rule is the reserved unconditional group (head atom 0).
    fn is_reserved(&self, rule: &RuleFact) -> bool {
        self.atom_tuples
            .get(&rule.head)
            .is_some_and(|atoms| atoms.contains(&0))
    }

    fn head(&self, rule: &RuleFact) -> BTreeSet<i64> {
        self.atom_tuples.get(&rule.head).cloned().unwrap_or_default()
    }

    /// Output symbol of each shown atom.
    fn atom_names(&self, dialect: OutputDialect) -> BTreeMap<i64, String> {
        let mut names = BTreeMap::new();
        for (symbol, reference) in &self.outputs {
            let atom = match dialect {
                OutputDialect::Atom => Some(*reference),
                OutputDialect::LiteralTuple => {
                    let literals = self.literal_tuples.get(reference);
                    match literals.map(|l| l.iter().copied().collect::<Vec<_>>()) {
                        Some(l) if l.len() == 1 && l[0] > 0 => Some(l[0]),
                        _ => None,
                    }
                }
            };
            if let Some(atom) = atom {
                names.entry(atom).or_insert_with(|| symbol.to_string());
            }
        }
        names
    }

    /// Literals an output fact depends on.
    fn output_condition(&self, reference: i64, dialect: OutputDialect) -> BTreeSet<i64> {
        match dialect {
            OutputDialect::Atom => BTreeSet::from([reference]),
            OutputDialect::LiteralTuple => self
                .literal_tuples
                .get(&reference)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

fn rule_fact(head: &Term, body: &Term) -> Option<RuleFact> {
    let choice = match head.name()? {
        "choice" => true,
        "disjunction" => false,
        _ => return None,
    };
    let head = head.arguments().first()?.number()?;
    let body = match (body.name()?, body.arguments()) {
        ("normal", [id]) => Body::Normal(id.number()?),
        ("sum", [id, bound]) => Body::Sum(id.number()?, bound.number()?),
        _ => return None,
    };
    Some(RuleFact { choice, head, body })
}

/// Split program text into statements at top-level periods.
fn statements(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                start = i + 1;
            }
            continue;
        }
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '%' if text[start..i].trim().is_empty() => in_comment = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            '.' if depth == 0 && !text[i + 1..].starts_with('.') && !text[..i].ends_with('.') => {
                let statement = text[start..i].trim();
                if !statement.is_empty() {
                    out.push(statement);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    out
}

/// Canonical, numbering-independent facts of a reified program.
///
/// Covers rules, loops and outputs; the reserved unconditional group is left
/// out since only [`super::compile`] emits it with a rule.
pub fn canonical_facts(text: &str, prefix: &str, dialect: OutputDialect) -> BTreeSet<String> {
    let tables = FactTables::parse(text, prefix);
    let names = tables.atom_names(dialect);
    let atom = |a: &i64| {
        names
            .get(a)
            .cloned()
            .unwrap_or_else(|| format!("#{a}"))
    };
    let literal = |l: &i64| {
        if *l < 0 {
            format!("not {}", atom(&-l))
        } else {
            atom(l)
        }
    };
    let join = |items: BTreeSet<String>| items.into_iter().collect::<Vec<_>>().join(";");

    let mut out = BTreeSet::new();
    for rule in &tables.rules {
        if tables.is_reserved(rule) {
            continue;
        }
        let head = join(tables.head(rule).iter().map(atom).collect());
        let kind = if rule.choice { "choice" } else { "disjunction" };
        let body = match rule.body {
            Body::Normal(id) => {
                let lits = tables.literal_tuples.get(&id).cloned().unwrap_or_default();
                format!("normal({{{}}})", join(lits.iter().map(literal).collect()))
            }
            Body::Sum(id, bound) => {
                let lits = tables.weighted_tuples.get(&id).cloned().unwrap_or_default();
                let items = lits
                    .iter()
                    .map(|(l, w)| format!("{w}:{}", literal(l)))
                    .collect();
                format!("sum({{{}}},{bound})", join(items))
            }
        };
        out.insert(format!("rule({kind}({{{head}}}),{body})"));
    }
    for members in tables.sccs.values() {
        out.insert(format!("scc({{{}}})", join(members.iter().map(atom).collect())));
    }
    for (symbol, reference) in &tables.outputs {
        let condition = tables.output_condition(*reference, dialect);
        out.insert(format!(
            "output({symbol},{{{}}})",
            join(condition.iter().map(literal).collect())
        ));
    }
    for (symbol, l) in &tables.output_terms {
        out.insert(format!("output_term({symbol},{})", literal(l)));
    }
    out
}

/// Rebuild the ground program described by reified facts.
///
/// Output atoms are recovered where the dialect allows; the reserved
/// unconditional group is skipped.
pub fn parse_program(text: &str, prefix: &str, dialect: OutputDialect) -> ObservedProgram {
    let tables = FactTables::parse(text, prefix);
    let atom_id = |a: i64| AtomId(a.unsigned_abs() as u32);
    let mut program = ObservedProgram::new();

    for rule in &tables.rules {
        if tables.is_reserved(rule) {
            continue;
        }
        let head: Vec<AtomId> = tables.head(rule).into_iter().map(atom_id).collect();
        match rule.body {
            Body::Normal(id) => {
                let body: Vec<Literal> = tables
                    .literal_tuples
                    .get(&id)
                    .map(|lits| lits.iter().map(|&l| Literal(l as i32)).collect())
                    .unwrap_or_default();
                program.rules.push(GroundRule {
                    choice: rule.choice,
                    head,
                    body,
                });
            }
            Body::Sum(id, bound) => {
                let body: Vec<(Literal, i32)> = tables
                    .weighted_tuples
                    .get(&id)
                    .map(|lits| lits.iter().map(|&(l, w)| (Literal(l as i32), w as i32)).collect())
                    .unwrap_or_default();
                program.weighted_rules.push(WeightedRule {
                    choice: rule.choice,
                    head,
                    lower_bound: bound as i32,
                    body,
                });
            }
        }
    }

    for (atom, name) in tables.atom_names(dialect) {
        if let Some(symbol) = Term::parse(&name) {
            program.output_atoms.push(OutputAtom {
                symbol,
                atom: atom_id(atom),
            });
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramObserver;
    use crate::reify::compile;

    /// clingo 5.4 `--output=reify --reify-sccs` for `a :- b. b :- a. b :- c. a :- c. {c}.`
    const CLINGO_LOOP: &str = "\
atom_tuple(0).
atom_tuple(0,1).
literal_tuple(0).
rule(choice(0),normal(0)).
atom_tuple(1).
atom_tuple(1,2).
literal_tuple(1).
literal_tuple(1,1).
rule(disjunction(1),normal(1)).
atom_tuple(2).
atom_tuple(2,3).
rule(disjunction(2),normal(1)).
literal_tuple(2).
literal_tuple(2,3).
rule(disjunction(1),normal(2)).
literal_tuple(3).
literal_tuple(3,2).
rule(disjunction(2),normal(3)).
output(c,1).
output(b,3).
output(a,2).
scc(0,2).
scc(0,3).
";

    fn observed_loop() -> ObservedProgram {
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
    fn statements_respect_nesting_strings_and_comments() {
        let text = "% a.b\np(\"x.y\",f(1.2)). q(1..3).\nr.";
        assert_eq!(statements(text), vec!["p(\"x.y\",f(1.2))", "q(1..3)", "r"]);
    }

    #[test]
    fn compiled_and_reifier_output_agree() {
        let compiled = compile(&observed_loop(), "_");
        let ours = canonical_facts(compiled.facts(), "_", OutputDialect::Atom);
        let theirs = canonical_facts(CLINGO_LOOP, "", OutputDialect::LiteralTuple);
        assert_eq!(ours, theirs);
        assert!(ours.contains("scc({a;b})"));
        assert!(ours.contains("rule(choice({c}),normal({}))"));
        assert!(ours.contains("rule(disjunction({a}),normal({b}))"));
    }

    #[test]
    fn renumbering_does_not_change_canonical_form() {
        let mut shuffled = ObservedProgram::new();
        shuffled.on_rule(false, &[AtomId(7)], &[Literal(9)]);
        shuffled.on_rule(false, &[AtomId(9)], &[Literal(8)]);
        shuffled.on_rule(true, &[AtomId(8)], &[]);
        shuffled.on_rule(false, &[AtomId(9)], &[Literal(7)]);
        shuffled.on_rule(false, &[AtomId(7)], &[Literal(8)]);
        for (name, atom) in [("a", 7), ("b", 9), ("c", 8)] {
            shuffled.on_output_atom(&Term::constant(name), AtomId(atom));
        }
        let a = canonical_facts(compile(&observed_loop(), "_").facts(), "_", OutputDialect::Atom);
        let b = canonical_facts(compile(&shuffled, "_").facts(), "_", OutputDialect::Atom);
        assert_eq!(a, b);
    }

    #[test]
    fn weighted_rules_are_described_by_content() {
        let mut p = ObservedProgram::new();
        p.on_weighted_rule(false, &[AtomId(3)], 1, &[(Literal(1), 1), (Literal(-2), 2)]);
        for (name, atom) in [("a", 1), ("b", 2), ("s", 3)] {
            p.on_output_atom(&Term::constant(name), AtomId(atom));
        }
        let facts = canonical_facts(compile(&p, "_").facts(), "_", OutputDialect::Atom);
        assert!(facts.contains("rule(disjunction({s}),sum({1:a;2:not b},1))"));
    }

    #[test]
    fn parse_program_recovers_rules_and_names() {
        let program = parse_program(CLINGO_LOOP, "", OutputDialect::LiteralTuple);
        assert_eq!(program.rules.len(), 5);
        assert_eq!(program.output_atoms.len(), 3);
        let compiled = compile(&observed_loop(), "__");
        let again = parse_program(compiled.as_str(), "__", OutputDialect::Atom);
        assert_eq!(again.rules, observed_loop().rules);
    }
}
