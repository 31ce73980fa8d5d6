//! Error type shared by every step in the core crate.
//!
//! Nothing here is retried: each variant is returned to the caller as soon as
//! the failing step is detected, with a message naming that step.

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the core crate.
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not enumerate the files below a source directory.
    #[error("failed to list artifacts under {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required secret value could not be read.
    #[error("failed to resolve credential {name}: {details}")]
    CredentialResolution { name: String, details: String },

    /// An external copy/sync/upload invocation failed or exited non-zero.
    #[error("{step} failed: {details}")]
    Transfer { step: String, details: String },

    #[error("invalid configuration: {details}")]
    Configuration { details: String },

    /// Rejected by strict flattening.
    #[error("unexpected artifact layout at {path}: {details}")]
    InvalidLayout { path: String, details: String },

    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelayError {
    pub fn transfer(step: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Transfer {
            step: step.into(),
            details: details.into(),
        }
    }

    pub fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a transfer failure with the name of the enclosing step, keeping
    /// every other variant as-is.
    pub fn within(self, step: &str) -> Self {
        match self {
            Self::Transfer {
                step: inner,
                details,
            } => Self::Transfer {
                step: format!("{step}: {inner}"),
                details,
            },
            other => other,
        }
    }
}
