//! Crate-level error type
//!
//! Only a handful of conditions are fatal: unreadable inputs before the
//! pipeline starts, and a collection that cannot be written at the end.
//! Everything in between recovers locally and reports a `Diagnostic`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a harchain run
#[derive(Debug, Error)]
pub enum HarchainError {
    #[error("capture decode error: {0}")]
    Capture(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("declared variables error: {0}")]
    Declarations(String),

    #[error("failed to write collection to {path}: {message}")]
    Output { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarchainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn output(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Output {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for the output-side failure; everything else happens before the pipeline runs.
    pub fn is_output_failure(&self) -> bool {
        matches!(self, Self::Output { .. })
    }
}

/// Result type for harchain operations
pub type Result<T> = std::result::Result<T, HarchainError>;
