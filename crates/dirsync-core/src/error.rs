//! Error types for dirsync-core

use std::path::PathBuf;

/// Result type for dirsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, validating or syncing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document could not be read from disk
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be parsed
    #[error("Failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown apiVersion '{found}' for {kind} (expected '{expected}')")]
    ApiVersion {
        kind: String,
        found: String,
        expected: &'static str,
    },

    #[error("Unexpected kind '{found}' (expected '{expected}')")]
    Kind { found: String, expected: &'static str },

    #[error("Expected at least one document of kind 'Config'")]
    MissingConfig,

    /// Any other configuration rule violation
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Expected to not manage overlapping paths: '{first}' and '{second}'")]
    OverlappingPaths { first: String, second: String },

    #[error("Expected to find one {kind} '{name}', but found none")]
    ResourceNotFound { kind: &'static str, name: String },

    #[error("Expected to find one {kind} '{name}', but found multiple")]
    ResourceAmbiguous { kind: &'static str, name: String },

    #[error("Unexpected field '{field}' in {kind} '{name}'")]
    UnexpectedField {
        kind: &'static str,
        name: String,
        field: String,
    },

    #[error("Invalid {kind} '{name}': {message}")]
    InvalidResource {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Unsupported content source '{kind}'")]
    UnsupportedSource { kind: String },

    /// Opaque failure reported by a source syncer
    #[error("{message}")]
    Fetch { message: String },

    #[error("Expected lock file {path} to exist when syncing in locked mode")]
    LockMissing { path: PathBuf },

    #[error("Expected lock entry for content '{path}'")]
    LockEntryMissing { path: String },

    #[error("Expected lock entry for content '{path}' to be '{expected}', but was '{found}'")]
    LockKindMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Expected directory override '{path}' to match exactly one content, matched {matched}")]
    OverrideMismatch { path: String, matched: usize },

    #[error("Expected to find newRootPath '{path}' within content")]
    NewRootMissing { path: String },

    #[error("Syncing directory '{path}'")]
    Directory {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Syncing directory content '{path}' ({kind})")]
    Content {
        path: String,
        kind: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Filesystem error from dirsync-fs
    #[error(transparent)]
    Fs(#[from] dirsync_fs::Error),

    /// Checkout error from dirsync-git
    #[error(transparent)]
    Git(#[from] dirsync_git::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A broken internal invariant; never caused by user input.
    #[error("Internal inconsistency: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error, or the error it wraps, signals a programming defect.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Internal { .. } => true,
            Self::Fs(e) => e.is_internal(),
            Self::Directory { source, .. } | Self::Content { source, .. } => source.is_internal(),
            _ => false,
        }
    }

    /// The innermost error, skipping directory and content context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Directory { source, .. } | Self::Content { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
