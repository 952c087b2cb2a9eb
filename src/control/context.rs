//! External functions available to the control and preference programs.

use std::collections::HashMap;

use crate::engine::GroundContext;
use crate::term::Term;

/// Ground context of a run: the current model's holds projection and the
/// preference library functions.
#[derive(Debug, Clone, Default)]
pub struct LibraryContext {
    holds: Vec<Term>,
    nholds: Vec<Term>,
    holds_domain: Vec<Term>,
    sequences: HashMap<String, i64>,
}

impl LibraryContext {
    pub fn new(holds_domain: Vec<Term>) -> Self {
        Self {
            holds_domain,
            ..Default::default()
        }
    }

    /// Expose a model's projection to `getHolds()` and `getNHolds()`.
    pub fn set_model<'a>(
        &mut self,
        holds: impl IntoIterator<Item = &'a Term>,
        nholds: impl IntoIterator<Item = &'a Term>,
    ) {
        self.holds = holds.into_iter().cloned().collect();
        self.nholds = nholds.into_iter().cloned().collect();
    }

    pub fn holds(&self) -> &[Term] {
        &self.holds
    }

    pub fn nholds(&self) -> &[Term] {
        &self.nholds
    }

    pub fn holds_domain(&self) -> &[Term] {
        &self.holds_domain
    }

    pub fn set_holds_domain(&mut self, domain: Vec<Term>) {
        self.holds_domain = domain;
    }
}

impl GroundContext for LibraryContext {
    fn call(&mut self, name: &str, args: &[Term]) -> Option<Vec<Term>> {
        let one = |t: Term| Some(vec![t]);
        match (name, args) {
            ("getHolds", []) => Some(self.holds.clone()),
            ("getNHolds", []) => Some(self.nholds.clone()),
            ("get_holds_domain", []) => Some(self.holds_domain.clone()),
            ("exp2", [x]) => {
                let exp = u32::try_from(x.number()?).ok()?;
                one(Term::Number(2i64.checked_pow(exp)?))
            }
            ("get", [tuple, index]) => {
                let i = usize::try_from(index.number()?).ok()?;
                one(tuple.arguments().get(i).cloned().unwrap_or_else(|| tuple.clone()))
            }
            ("get_mode", []) => one(Term::String("normal".into())),
            ("get_sequence", [name, _elem]) => {
                let counter = self.sequences.entry(name.to_string()).or_insert(0);
                *counter += 1;
                one(Term::Number(*counter))
            }
            ("length", [tuple]) => {
                let len = match tuple {
                    Term::Function { args, .. } => args.len() as i64,
                    _ => 1,
                };
                one(Term::Number(len))
            }
            ("log2up", [x]) => {
                let n = x.number().filter(|&n| n > 0)?;
                one(Term::Number(log2_ceil(n)))
            }
            _ => None,
        }
    }
}

fn log2_ceil(n: i64) -> i64 {
    if n <= 1 {
        0
    } else {
        i64::from(64 - (n - 1).leading_zeros())
    }
}
