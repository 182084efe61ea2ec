//! Filesystem primitives for dirsync
//!
//! Provides path normalization, the per-run staging area, include/exclude
//! filtering of staged trees, symlink containment checks and idempotent
//! atomic writes.

pub mod digest;
pub mod error;
pub mod filter;
pub mod io;
pub mod path;
pub mod staging;
pub mod symlink;

pub use error::{Error, Result};
pub use filter::{DEFAULT_LEGAL_PATHS, FileFilter};
pub use path::{NormalizedPath, validate_managed_path};
pub use staging::{StagingArea, TempArea};
pub use symlink::validate_symlinks;
