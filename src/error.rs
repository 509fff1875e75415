//! Centralized error types for mailmark.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailmark library.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The base output directory could not be created.
    ///
    /// This is the only error that is fatal to a run.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The raw message could not be parsed as a MIME document.
    #[error("MIME parsing error: {0}")]
    Mime(String),

    /// The message source failed to list or fetch a message.
    #[error("Source error for message '{id}': {reason}")]
    Source { id: String, reason: String },
}

/// Convenience alias for `Result<T, ExportError>`.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ExportError`
/// when no path context is available (rare — prefer `ExportError::io`).
impl From<std::io::Error> for ExportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
