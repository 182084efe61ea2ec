//! Error types for dirsync-git

/// Result type for dirsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dirsync-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("Reference '{reference}' not found in {url}")]
    RefNotFound { reference: String, url: String },
}
