//! Out-of-process reification through a clingo binary.
//!
//! The program is written to a temporary file and reified with
//! `--output=reify --reify-sccs`. Every output line that starts with an
//! identifier is prefixed; this relies on the reifier printing one fact per
//! line, which the golden-output tests pin down.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::engine::GroundContext;
use crate::error::{ReifyError, ReifyResult};

use super::{MetaFactBase, OutputDialect, Reifier};

/// Oldest reifier version with `--output=reify`.
pub const MIN_VERSION: (u32, u32) = (5, 3);

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^clingo version (\d+)\.(\d+)").expect("valid regex"));

static LINE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\w+)").expect("valid regex"));

/// Reifier backed by an external binary.
#[derive(Debug, Clone)]
pub struct ExternalReifier {
    command: PathBuf,
    version: (u32, u32),
}

impl ExternalReifier {
    /// Locate the binary and check its version before any work is done.
    pub fn new(command: impl Into<PathBuf>) -> ReifyResult<Self> {
        let command = command.into();
        let version = check_version(&command)?;
        tracing::info!(
            command = %command.display(),
            major = version.0,
            minor = version.1,
            "external reifier ready"
        );
        Ok(Self { command, version })
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    /// Reify `program` and prefix every fact with `prefix`.
    pub fn reify_text(&self, program: &str, prefix: &str) -> ReifyResult<MetaFactBase> {
        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(program.as_bytes())?;
        input.flush()?;

        let output = Command::new(&self.command)
            .arg("--output=reify")
            .arg("--reify-sccs")
            .arg(input.path())
            .output()
            .map_err(|source| spawn_error(&self.command, source))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            tracing::error!(
                command = %self.command.display(),
                status = %output.status,
                "reifier failed"
            );
            return Err(ReifyError::ReifierFailed {
                command: self.command.display().to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.is_empty() {
            tracing::warn!(
                command = %self.command.display(),
                stderr = %stderr.trim(),
                "reifier wrote to stderr"
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let facts = prefix_lines(&stdout, prefix);
        tracing::debug!(prefix, bytes = facts.len(), "external reification done");
        Ok(MetaFactBase::new(facts, prefix, OutputDialect::LiteralTuple))
    }
}

impl Reifier for ExternalReifier {
    fn reify(
        &mut self,
        program: &str,
        _context: &mut dyn GroundContext,
        prefix: &str,
    ) -> ReifyResult<MetaFactBase> {
        self.reify_text(program, prefix)
    }

    fn dialect(&self) -> OutputDialect {
        OutputDialect::LiteralTuple
    }
}

/// Run `<command> --version` and require at least [`MIN_VERSION`].
pub fn check_version(command: &Path) -> ReifyResult<(u32, u32)> {
    let output = Command::new(command)
        .arg("--version")
        .output()
        .map_err(|source| spawn_error(command, source))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout).ok_or_else(|| ReifyError::ReifierNotFound {
        command: command.display().to_string(),
    })?;
    if version < MIN_VERSION {
        return Err(ReifyError::ReifierTooOld {
            major: version.0,
            minor: version.1,
        });
    }
    Ok(version)
}

/// Extract `(major, minor)` from `clingo --version` output.
pub fn parse_version(output: &str) -> Option<(u32, u32)> {
    let caps = VERSION_RE.captures(output)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Prefix every line that starts with an identifier.
pub fn prefix_lines(output: &str, prefix: &str) -> String {
    LINE_START_RE
        .replace_all(output, |caps: &Captures| format!("{prefix}{}", &caps[1]))
        .into_owned()
}

fn spawn_error(command: &Path, source: std::io::Error) -> ReifyError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ReifyError::ReifierNotFound {
            command: command.display().to_string(),
        }
    } else {
        ReifyError::Io { source }
    }
}
