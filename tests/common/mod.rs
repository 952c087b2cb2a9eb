//! Scripted solving engine for controller and meta-program tests.
//!
//! The fake enumerates a fixed list of candidate models and interprets the
//! control program parts by name: `do_holds(s)` records the holds projection
//! the context reports, `not_unsat(0,s)` adds an improvement constraint over
//! step `s` that is active while `volatile(m(0),m(s))` is true, `unsat(p,0)`
//! forbids models dominated by step `p`, and `delete_model()` removes the
//! current projection.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use qualopt::engine::{GroundContext, Model, ObservedGrounder, ProgramPart, SolveOutcome, SolvingEngine};
use qualopt::error::{EngineError, EngineResult};
use qualopt::program::{AtomId, Literal, ProgramObserver};
use qualopt::term::Term;

pub type Atoms = BTreeSet<String>;

/// `better(new, old)` over holds projections.
pub type Better = Box<dyn Fn(&Atoms, &Atoms) -> bool>;

pub fn atoms(names: &[&str]) -> Atoms {
    names.iter().map(|s| s.to_string()).collect()
}

pub struct FakeEngine {
    ns: String,
    candidates: Vec<Atoms>,
    domain: Atoms,
    better: Better,
    approx_allows: Option<Box<dyn Fn(&Atoms) -> bool>>,

    pub added: Vec<(String, Vec<String>, String)>,
    pub ground_log: Vec<String>,
    pub error_atoms: Vec<Term>,
    pub signature_atoms: BTreeMap<(String, usize), Vec<Term>>,
    /// Fail the solve call with this index (0-based).
    pub fail_on_solve: Option<usize>,
    pub assigned: Vec<(String, bool)>,
    pub released: Vec<String>,

    steps: BTreeMap<u32, Atoms>,
    improvements: Vec<u32>,
    dominated_by: Vec<u32>,
    deleted: Vec<Atoms>,
    externals: BTreeMap<String, bool>,
    model_limit: u64,
    solve_calls: usize,
}

impl FakeEngine {
    pub fn new(candidates: Vec<Atoms>, domain: Atoms, better: Better) -> Self {
        Self {
            ns: "_".into(),
            candidates,
            domain,
            better,
            approx_allows: None,
            added: Vec::new(),
            ground_log: Vec::new(),
            error_atoms: Vec::new(),
            signature_atoms: BTreeMap::new(),
            fail_on_solve: None,
            assigned: Vec::new(),
            released: Vec::new(),
            steps: BTreeMap::new(),
            improvements: Vec::new(),
            dominated_by: Vec::new(),
            deleted: Vec::new(),
            externals: BTreeMap::new(),
            model_limit: 0,
            solve_calls: 0,
        }
    }

    /// Under the `approx` assumption only projections accepted by `allows` are models.
    pub fn with_approx(mut self, allows: impl Fn(&Atoms) -> bool + 'static) -> Self {
        self.approx_allows = Some(Box::new(allows));
        self
    }

    pub fn domain_terms(&self) -> Vec<Term> {
        self.domain.iter().map(|a| Term::constant(a.as_str())).collect()
    }

    pub fn added_program(&self, name: &str) -> Option<&str> {
        self.added
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, text)| text.as_str())
    }

    fn volatile(&self, a: i64, b: i64) -> String {
        let ns = &self.ns;
        format!("{ns}volatile({ns}m({a}),{ns}m({b}))")
    }

    fn projection(&self, candidate: &Atoms) -> Atoms {
        candidate.intersection(&self.domain).cloned().collect()
    }

    fn holds_from(context: &mut dyn GroundContext, function: &str) -> Atoms {
        context
            .call(function, &[])
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn admits(&self, projection: &Atoms, assumptions: &[(Term, bool)]) -> bool {
        for &step in &self.improvements {
            let active = self.externals.get(&self.volatile(0, step.into())).copied().unwrap_or(false);
            if active && !(self.better)(projection, &self.steps[&step]) {
                return false;
            }
        }
        for step in &self.dominated_by {
            if (self.better)(&self.steps[step], projection) {
                return false;
            }
        }
        if self.deleted.contains(projection) {
            return false;
        }
        let holds = format!("{}holds", self.ns);
        let approx = format!("{}approx", self.ns);
        for (term, truth) in assumptions {
            if term.matches(&holds, 2) {
                let atom = term.arguments()[0].to_string();
                if projection.contains(&atom) != *truth {
                    return false;
                }
            } else if term.name() == Some(approx.as_str()) && *truth {
                if let Some(allows) = &self.approx_allows {
                    if !allows(projection) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn model(&self, candidate: &Atoms, projection: &Atoms) -> Model {
        let at_zero = |x: &String| {
            Term::function(format!("{}holds_at_zero", self.ns), vec![Term::constant(x.as_str())])
        };
        let mut shown: Vec<Term> = candidate.iter().map(|a| Term::constant(a.as_str())).collect();
        shown.extend(projection.iter().map(at_zero));
        Model {
            shown,
            complement: self.domain.difference(projection).map(at_zero).collect(),
        }
    }
}

fn step_params(part: &ProgramPart) -> Vec<i64> {
    part.params.iter().filter_map(Term::number).collect()
}

impl SolvingEngine for FakeEngine {
    fn add(&mut self, name: &str, params: &[&str], program: &str) -> EngineResult<()> {
        self.added.push((
            name.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
            program.to_string(),
        ));
        Ok(())
    }

    fn ground(&mut self, parts: &[ProgramPart], context: &mut dyn GroundContext) -> EngineResult<()> {
        for part in parts {
            self.ground_log.push(part.to_string());
            let steps = step_params(part);
            match (part.name.as_str(), steps.as_slice()) {
                ("do_holds", [s]) => {
                    let holds = Self::holds_from(context, "getHolds");
                    self.steps.insert(*s as u32, holds);
                }
                ("not_unsat", [0, s]) => self.improvements.push(*s as u32),
                ("volatile_external", [a, b]) => {
                    let atom = self.volatile(*a, *b);
                    self.externals.entry(atom).or_insert(false);
                }
                ("unsat", [p, 0]) => self.dominated_by.push(*p as u32),
                ("delete_model", []) => {
                    let holds = Self::holds_from(context, "getHolds");
                    self.deleted.push(holds);
                }
                ("do_holds_at_zero" | "preference_base" | "approx" | "metasp", []) => {}
                ("preference" | "volatile_fact", [_, _]) | ("open_holds", [_]) => {}
                (name, _) => {
                    return Err(EngineError::UnknownPart {
                        name: name.to_string(),
                        arity: part.params.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn solve(
        &mut self,
        assumptions: &[(Term, bool)],
        on_model: &mut dyn FnMut(&Model),
    ) -> EngineResult<SolveOutcome> {
        let call = self.solve_calls;
        self.solve_calls += 1;
        if self.fail_on_solve == Some(call) {
            return Err(EngineError::Runtime {
                message: "solver crashed".into(),
            });
        }
        let mut found = 0u64;
        for candidate in &self.candidates {
            let projection = self.projection(candidate);
            if !self.admits(&projection, assumptions) {
                continue;
            }
            on_model(&self.model(candidate, &projection));
            found += 1;
            if self.model_limit != 0 && found >= self.model_limit {
                break;
            }
        }
        Ok(if found > 0 {
            SolveOutcome::Satisfiable
        } else {
            SolveOutcome::Unsatisfiable
        })
    }

    fn assign_external(&mut self, atom: &Term, truth: bool) -> EngineResult<()> {
        let key = atom.to_string();
        match self.externals.get_mut(&key) {
            Some(value) => {
                *value = truth;
                self.assigned.push((key, truth));
                Ok(())
            }
            None => Err(EngineError::UnknownExternal { atom: key }),
        }
    }

    fn release_external(&mut self, atom: &Term) -> EngineResult<()> {
        let key = atom.to_string();
        match self.externals.get_mut(&key) {
            Some(value) => {
                *value = false;
                self.released.push(key);
                Ok(())
            }
            None => Err(EngineError::UnknownExternal { atom: key }),
        }
    }

    fn atoms_by_signature(&self, name: &str, arity: usize) -> Vec<Term> {
        if name == format!("{}_error", self.ns) && arity == 1 {
            return self.error_atoms.clone();
        }
        self.signature_atoms
            .get(&(name.to_string(), arity))
            .cloned()
            .unwrap_or_default()
    }

    fn model_limit(&self) -> u64 {
        self.model_limit
    }

    fn set_model_limit(&mut self, limit: u64) {
        self.model_limit = limit;
    }
}

/// Grounds `a :- b. b :- a. b :- c. a :- c. {c}.` with a=1, b=2, c=3,
/// whatever program text it is given.
pub struct LoopGrounder;

impl ObservedGrounder for LoopGrounder {
    fn ground_observed(
        &mut self,
        _program: &str,
        _context: &mut dyn GroundContext,
        observer: &mut dyn ProgramObserver,
    ) -> EngineResult<()> {
        observe_loop(observer);
        Ok(())
    }
}

pub fn observe_loop(observer: &mut dyn ProgramObserver) {
    observer.on_rule(true, &[AtomId(3)], &[]);
    observer.on_rule(false, &[AtomId(1)], &[Literal(2)]);
    observer.on_rule(false, &[AtomId(2)], &[Literal(1)]);
    observer.on_rule(false, &[AtomId(2)], &[Literal(3)]);
    observer.on_rule(false, &[AtomId(1)], &[Literal(3)]);
    for (name, atom) in [("a", 1), ("b", 2), ("c", 3)] {
        observer.on_output_atom(&Term::constant(name), AtomId(atom));
    }
}

/// clingo `--output=reify --reify-sccs` for the same loop program.
pub const CLINGO_LOOP_REIFIED: &str = "\
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

/// A shell script standing in for the clingo binary.
///
/// `--version` reports `version`; any other call appends the program file
/// (third argument) to `inputs.lp` next to the script and then runs `reify`,
/// a shell fragment producing the reifier's output and exit status.
#[cfg(unix)]
pub fn stub_reifier(dir: &std::path::Path, version: &str, reify: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("clingo");
    let inputs = dir.join("inputs.lp");
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then\n\
         echo \"clingo version {version}\"\n\
         echo \"Address model: 64-bit\"\n\
         exit 0\n\
         fi\n\
         cat \"$3\" >> '{}'\n\
         {reify}\n",
        inputs.display()
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Shell fragment printing `facts` as reifier output.
pub fn print_facts(facts: &str) -> String {
    format!("cat <<'EOF'\n{facts}EOF")
}

/// Programs the stub reifier was given, concatenated.
#[cfg(unix)]
pub fn stub_inputs(dir: &std::path::Path) -> String {
    std::fs::read_to_string(dir.join("inputs.lp")).unwrap_or_default()
}

/// Grounds `{a;b}. c :- not a. d :- 1 #sum{1:a;2:b}.` with a=1, b=2, c=3, d=4.
pub fn observe_choice_negation_sum(observer: &mut dyn ProgramObserver) {
    observer.on_rule(true, &[AtomId(1), AtomId(2)], &[]);
    observer.on_rule(false, &[AtomId(3)], &[Literal(-1)]);
    observer.on_weighted_rule(false, &[AtomId(4)], 1, &[(Literal(1), 1), (Literal(2), 2)]);
    for (name, atom) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        observer.on_output_atom(&Term::constant(name), AtomId(atom));
    }
}

/// Reifier output for the same program: tuples numbered from 0, outputs
/// referring to literal tuples.
pub const CHOICE_NEGATION_SUM_REIFIED: &str = "\
atom_tuple(0).
atom_tuple(0,1).
atom_tuple(0,2).
literal_tuple(0).
rule(choice(0),normal(0)).
atom_tuple(1).
atom_tuple(1,3).
literal_tuple(1).
literal_tuple(1,-1).
rule(disjunction(1),normal(1)).
atom_tuple(2).
atom_tuple(2,4).
weighted_literal_tuple(0).
weighted_literal_tuple(0,1,1).
weighted_literal_tuple(0,2,2).
rule(disjunction(2),sum(0,1)).
literal_tuple(2).
literal_tuple(2,1).
output(a,2).
literal_tuple(3).
literal_tuple(3,2).
output(b,3).
literal_tuple(4).
literal_tuple(4,3).
output(c,4).
literal_tuple(5).
literal_tuple(5,4).
output(d,5).
";
