//! Rich diagnostic error types for qualopt.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. The top-level [`QualoptError`] wraps them
//! transparently so the full diagnostic reaches the user.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error, Diagnostic)]
pub enum QualoptError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Reify(#[from] ReifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Reification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReifyError {
    #[error("reifier binary not found: `{command} --version` produced no clingo version")]
    #[diagnostic(
        code(qualopt::reify::not_found),
        help(
            "The out-of-process reifier needs a clingo binary on PATH. \
             Install clingo 5.3 or newer, point `reifier.command` at it, \
             or switch `meta` to `in_process`."
        )
    )]
    ReifierNotFound { command: String },

    #[error("reifier binary too old: found clingo {major}.{minor}, need 5.3 or newer")]
    #[diagnostic(
        code(qualopt::reify::too_old),
        help("Upgrade clingo to version 5.3 or newer; older versions lack `--output=reify`.")
    )]
    ReifierTooOld { major: u32, minor: u32 },

    #[error("reifier failed ({status}): {stderr}")]
    #[diagnostic(
        code(qualopt::reify::failed),
        help(
            "`{command} --output=reify` rejected the program. The message above is the \
             reifier's own output; fix the base or preference program it points at."
        )
    )]
    ReifierFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("reifier I/O error: {source}")]
    #[diagnostic(
        code(qualopt::reify::io),
        help(
            "Writing the program to a temporary file or running the reifier failed. \
             Check the temporary directory and the reifier command."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("grounding for reification failed: {0}")]
    #[diagnostic(
        code(qualopt::reify::grounding),
        help("The engine could not ground the program handed to the in-process reifier.")
    )]
    Grounding(#[from] EngineError),
}

impl From<std::io::Error> for ReifyError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Failures reported by a solving-engine adapter.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("engine runtime error: {message}")]
    #[diagnostic(
        code(qualopt::engine::runtime),
        help("The solving engine reported an internal error. The run stops at this point.")
    )]
    Runtime { message: String },

    #[error("unknown program part: {name}/{arity}")]
    #[diagnostic(
        code(qualopt::engine::unknown_part),
        help("Program parts must be added to the engine before they are grounded.")
    )]
    UnknownPart { name: String, arity: usize },

    #[error("unknown external atom: {atom}")]
    #[diagnostic(
        code(qualopt::engine::unknown_external),
        help("Externals must be declared by a grounded `#external` statement before they are assigned.")
    )]
    UnknownExternal { atom: String },
}

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ControlError {
    #[error("preference specification error:{messages}")]
    #[diagnostic(
        code(qualopt::control::specification),
        help(
            "The preference specification could not be resolved (for example an \
             unknown preference type). Fix the reported statements and run again."
        )
    )]
    Specification { messages: String },

    #[error(
        "same stable model computed twice at step {step}, there is an error in the input, \
         probably an incorrect preference program"
    )]
    #[diagnostic(
        code(qualopt::control::same_model),
        help(
            "A model was improved onto itself, so the base and preference programs \
             are inconsistent. Check the preference program; retrying will not help."
        )
    )]
    SameModel { step: u32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reify(#[from] ReifyError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    #[diagnostic(
        code(qualopt::config::io),
        help("Check that the configuration file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {message}")]
    #[diagnostic(
        code(qualopt::config::parse),
        help(
            "The configuration must be valid TOML. Known keys: max_models, mode, \
             checker, enumerate_ties, namespace, meta, [reifier] command."
        )
    )]
    Parse { message: String },

    #[error("cannot serialize config: {message}")]
    #[diagnostic(
        code(qualopt::config::serialize),
        help("Every configuration value must be representable in TOML; paths must be valid UTF-8.")
    )]
    Serialize { message: String },

    #[error("invalid namespace \"{namespace}\"")]
    #[diagnostic(
        code(qualopt::config::namespace),
        help("The namespace must be a non-empty run of underscores, e.g. \"_\" or \"__\".")
    )]
    Namespace { namespace: String },
}

pub type QualoptResult<T> = std::result::Result<T, QualoptError>;
pub type ReifyResult<T> = std::result::Result<T, ReifyError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
pub type ControlResult<T> = std::result::Result<T, ControlError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
