//! Preference meta-program assembly.
//!
//! Preferences that cannot be expressed by the tractable encodings are
//! checked by a meta program with three parts:
//!
//! 1. the reified base program, in the meta-base namespace,
//! 2. the reified preference program, in the meta-preference namespace,
//! 3. a binding that ties the truth of `holds(X,0)` and `holds(X,1)` in the
//!    preference program to the two interpretations of the base program.
//!
//! The binding variant follows the reifier: [`OutputDialect::Atom`] output
//! binds through atoms, [`OutputDialect::LiteralTuple`] through tuples.

use std::fmt::{self, Write};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{meta_base_prefix, meta_pref_prefix, MetaMode, RunConfig};
use crate::engine::{GroundContext, ObservedGrounder, SolvingEngine};
use crate::error::ReifyResult;
use crate::program::ObservedProgram;
use crate::reify::external::ExternalReifier;
use crate::reify::observed::InProcessReifier;
use crate::reify::template::{
    Namespaces, Template, BINDING_BY_ATOM, BINDING_BY_TUPLE, PREFERENCE_HEADER,
};
use crate::reify::{compile, OutputDialect, Reifier};
use crate::term::Term;

/// Program text with the constant overrides applied by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramText {
    pub text: String,
    /// Names of overridden constants.
    pub old_constants: Vec<String>,
    /// Override values, index-aligned with `old_constants`.
    pub new_constants: Vec<String>,
}

impl ProgramText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// `#const` lines restoring the overrides.
    pub fn constant_definitions(&self) -> String {
        let mut out = String::new();
        for (old, new) in self.old_constants.iter().zip(&self.new_constants) {
            let _ = writeln!(out, "#const {old}={new}.");
        }
        out
    }
}

/// A statement of the preference program, as delivered by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceStatement {
    /// `#const name=value.`
    Definition { name: String, value: String },
    /// A `#program` directive; dropped from the meta program.
    Program,
    /// Any other statement, kept verbatim.
    Other(String),
}

impl fmt::Display for PreferenceStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition { name, value } => write!(f, "#const {name}={value}."),
            Self::Program => Ok(()),
            Self::Other(text) => write!(f, "{text}"),
        }
    }
}

/// Parser output the meta program is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSource {
    pub base: ProgramText,
    pub specification: ProgramText,
    pub statements: Vec<PreferenceStatement>,
    /// Constant definitions that are not part of the base program.
    pub constants_nb: String,
}

/// Assembles the meta program for one namespace.
pub struct MetaProgramBuilder<'a> {
    namespace: &'a str,
    source: &'a PreferenceSource,
}

static SPECIFICATION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(_*)(preference|optimize)").expect("valid regex"));

impl<'a> MetaProgramBuilder<'a> {
    pub fn new(namespace: &'a str, source: &'a PreferenceSource) -> Self {
        Self { namespace, source }
    }

    fn base_prefix(&self) -> String {
        meta_base_prefix(self.namespace)
    }

    fn pref_prefix(&self) -> String {
        meta_pref_prefix(self.namespace)
    }

    fn namespaces(&self) -> Namespaces {
        Namespaces {
            own: self.namespace.to_string(),
            ctl: self.namespace.to_string(),
            base: self.base_prefix(),
            pref: self.pref_prefix(),
        }
    }

    /// Ground preference specification facts, one signature per line.
    pub fn specification(&self, engine: &dyn SolvingEngine) -> String {
        let ns = self.namespace;
        let signatures = [
            (format!("{ns}preference"), 2),
            (format!("{ns}preference"), 5),
            (format!("{ns}optimize"), 1),
        ];
        let mut out = String::new();
        for (name, arity) in &signatures {
            let facts: Vec<String> = engine
                .atoms_by_signature(name, *arity)
                .iter()
                .map(|atom| format!("{atom}."))
                .collect();
            out.push_str(&facts.join(" "));
            out.push('\n');
        }
        out
    }

    /// The preference program that gets reified: header, specification,
    /// statements, and non-base constants.
    pub fn preference_program(&self, engine: &dyn SolvingEngine) -> String {
        let header = Template::parse(PREFERENCE_HEADER).render_in(self.namespace);
        let statements: Vec<String> = self
            .source
            .statements
            .iter()
            .map(ToString::to_string)
            .collect();
        format!(
            "{header}{}{}{}",
            self.specification(engine),
            statements.join("\n"),
            self.source.constants_nb
        )
    }

    /// Base program handed to an external reifier: the specification's
    /// `preference`/`optimize` lines are commented out, constant overrides
    /// restored, and the holds projection shown.
    pub fn external_base_program(&self) -> String {
        let specification = SPECIFICATION_LINE_RE
            .replace_all(&self.source.specification.text, "%${1}${2}");
        format!(
            "{}\n{specification}\n{}#show {}holds/2.\n",
            self.source.base.text,
            self.source.base.constant_definitions(),
            self.namespace
        )
    }

    /// Build the full meta program.
    ///
    /// With an atom-dialect reifier the base program comes from the
    /// statements observed while the engine grounded it; otherwise the base
    /// text is reified as well.
    pub fn build(
        &self,
        engine: &dyn SolvingEngine,
        reifier: &mut dyn Reifier,
        context: &mut dyn GroundContext,
        observed_base: &ObservedProgram,
        holds_domain: &[Term],
    ) -> ReifyResult<String> {
        let dialect = reifier.dialect();
        let (meta_base, meta_pref, binding) = match dialect {
            OutputDialect::Atom => {
                let base = compile(observed_base, &self.base_prefix());
                let pref = reifier.reify(
                    &self.preference_program(engine),
                    context,
                    &self.pref_prefix(),
                )?;
                (base, pref, BINDING_BY_ATOM)
            }
            OutputDialect::LiteralTuple => {
                let base =
                    reifier.reify(&self.external_base_program(), context, &self.base_prefix())?;
                let program = format!(
                    "{}{}",
                    self.preference_program(engine),
                    library_script(holds_domain)
                );
                let pref = reifier.reify(&program, context, &self.pref_prefix())?;
                (base, pref, BINDING_BY_TUPLE)
            }
        };
        let binding = Template::parse(binding).render(&self.namespaces());
        tracing::info!(
            ?dialect,
            base_bytes = meta_base.as_str().len(),
            pref_bytes = meta_pref.as_str().len(),
            "meta program assembled"
        );
        Ok(format!(
            "{}{}{binding}",
            meta_base.into_string(),
            meta_pref.into_string()
        ))
    }
}

/// Script block defining the library functions for an external grounder,
/// with `get_holds_domain()` returning `holds_domain`.
pub fn library_script(holds_domain: &[Term]) -> String {
    let domain: Vec<String> = holds_domain
        .iter()
        .map(|t| format!("    clingo.parse_term(\"\"\"{t}\"\"\")"))
        .collect();
    format!(
        r#"
#script(python)

import math
import clingo

def exp2(x):
    return int(math.pow(2, x.number))

def get(atuple, index):
    try:
        return atuple.arguments[index.number]
    except Exception:
        return atuple

def get_mode():
    return 'normal'

sequences = {{}}
def get_sequence(name, elem):
    key = str(name)
    sequences[key] = sequences.get(key, 0) + 1
    return sequences[key]

def length(atuple):
    try:
        return len(atuple.arguments)
    except Exception:
        return 1

def log2up(x):
    return int(math.ceil(math.log(x.number, 2)))

holds_domain = [
{}
]
def get_holds_domain():
    return holds_domain

#end.
"#,
        domain.join(",\n")
    )
}

/// What the controller needs to build and ground the meta program.
pub struct MetaSetup {
    pub source: PreferenceSource,
    /// Statements observed while the engine grounded the base program.
    pub observed_base: ObservedProgram,
    pub reifier: Box<dyn Reifier>,
}

impl MetaSetup {
    /// Reify through an observing grounder.
    pub fn in_process<G>(grounder: G, source: PreferenceSource, observed_base: ObservedProgram) -> Self
    where
        G: ObservedGrounder + 'static,
    {
        Self {
            source,
            observed_base,
            reifier: Box::new(InProcessReifier::new(grounder)),
        }
    }

    /// Reify with the configured external binary; fails early when it is
    /// missing or too old.
    pub fn external(config: &RunConfig, source: PreferenceSource) -> ReifyResult<Self> {
        Ok(Self {
            source,
            observed_base: ObservedProgram::new(),
            reifier: Box::new(ExternalReifier::new(&config.reifier.command)?),
        })
    }

    /// Whether this setup fits `mode`.
    pub fn matches(&self, mode: MetaMode) -> bool {
        match mode {
            MetaMode::Off => false,
            MetaMode::InProcess => self.reifier.dialect() == OutputDialect::Atom,
            MetaMode::External => self.reifier.dialect() == OutputDialect::LiteralTuple,
        }
    }
}
