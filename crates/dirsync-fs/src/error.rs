//! Error types for dirsync-fs

use std::path::PathBuf;

/// Result type for dirsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dirsync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Expected path '{path}' to not be empty, '.', '..' or '/'")]
    DisallowedPath { path: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid symlink found to '{target}' which is outside of '{root}'")]
    SymlinkEscape { target: PathBuf, root: PathBuf },

    #[error("Unable to resolve symlink '{path}': {source}")]
    SymlinkUnresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    /// A broken internal invariant; never caused by user input.
    #[error("Internal inconsistency: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error signals a programming defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}
