//! Run configuration, persisted as TOML.
//!
//! A [`RunConfig`] is fixed for the duration of one optimization run; the
//! controller keeps everything that changes in its own run state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// How candidate models are searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolvingMode {
    /// Only the exact preference program is used.
    #[default]
    Exact,
    /// A relaxed program bounds the first candidates; the exact phase takes
    /// over once it becomes unsatisfiable.
    Approx,
}

impl std::fmt::Display for SolvingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Approx => write!(f, "approx"),
        }
    }
}

/// Whether and how the preference meta-program is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaMode {
    #[default]
    Off,
    /// Reify by observing an in-process grounder.
    InProcess,
    /// Reify with an external clingo binary.
    External,
}

impl std::fmt::Display for MetaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::InProcess => write!(f, "in_process"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Settings for the out-of-process reifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReifierConfig {
    /// Reifier binary, looked up on `PATH` when relative.
    #[serde(default = "default_reifier_command")]
    pub command: PathBuf,
}

fn default_reifier_command() -> PathBuf {
    PathBuf::from("clingo")
}

impl Default for ReifierConfig {
    fn default() -> Self {
        Self {
            command: default_reifier_command(),
        }
    }
}

/// Optimization run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of optimal models to compute; 0 computes all of them.
    #[serde(default = "default_max_models")]
    pub max_models: u64,
    #[serde(default)]
    pub mode: SolvingMode,
    /// Open the holds projection of each step so a checker can constrain it.
    #[serde(default)]
    pub checker: bool,
    /// After each optimum, enumerate the models that tie with it.
    #[serde(default)]
    pub enumerate_ties: bool,
    /// Prefix of every control predicate; a non-empty run of underscores.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub meta: MetaMode,
    #[serde(default)]
    pub reifier: ReifierConfig,
}

fn default_max_models() -> u64 {
    1
}
fn default_namespace() -> String {
    "_".into()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_models: default_max_models(),
            mode: SolvingMode::default(),
            checker: false,
            enumerate_ties: false,
            namespace: default_namespace(),
            meta: MetaMode::default(),
            reifier: ReifierConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.namespace.is_empty() || !self.namespace.chars().all(|c| c == '_') {
            return Err(ConfigError::Namespace {
                namespace: self.namespace.clone(),
            });
        }
        Ok(())
    }
}

/// Prefix of the reified base program under `namespace`.
pub fn meta_base_prefix(namespace: &str) -> String {
    format!("{namespace}{}", "_".repeat(META_BASE_UNDERSCORES))
}

/// Prefix of the reified preference program under `namespace`.
pub fn meta_pref_prefix(namespace: &str) -> String {
    format!("{namespace}{}", "_".repeat(META_PREF_UNDERSCORES))
}

/// Underscores added to the namespace for the reified base program.
pub const META_BASE_UNDERSCORES: usize = 1;
/// Underscores added to the namespace for the reified preference program.
pub const META_PREF_UNDERSCORES: usize = 2;
