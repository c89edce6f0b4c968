//! Error types for the reconciliation engine.
//!
//! Every failure names the declarative entity it belongs to (a fragment path,
//! a host key path, an external program) so the caller can tell which unit of
//! work did not converge.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reconciling the declared SSH state with the host.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A host key declaration or config value that should have been rejected
    /// before reaching the engine.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Creating, removing or writing a file or directory failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An external executable could not be started or exited non-zero.
    #[error("{program} failed: {detail}")]
    ExternalTool { program: String, detail: String },

    /// The daemon state could not be determined; no transition was attempted.
    #[error("could not determine Remote Login state: {0}")]
    StateQuery(String),

    /// One or more host keys could not be materialized.
    #[error("failed to materialize {} host key(s): {}", .0.len(), KeyFailures(.0))]
    HostKeys(Vec<KeyFailure>),

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// The current platform has no service backend.
    #[error("unsupported platform: {0}")]
    Unsupported(&'static str),
}

impl ReconcileError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn filesystem(
        path: impl Into<PathBuf>,
        action: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::Filesystem {
            path: path.into(),
            action,
            source,
        }
    }
}

/// A single host key that failed to materialize.
#[derive(Debug)]
pub struct KeyFailure {
    pub path: PathBuf,
    pub error: ReconcileError,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

struct KeyFailures<'a>(&'a [KeyFailure]);

impl fmt::Display for KeyFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ReconcileError>;
