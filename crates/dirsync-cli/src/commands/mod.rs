//! Command implementations

pub mod sync;
pub mod validate;

pub use sync::{SyncArgs, run_sync};
pub use validate::run_validate;

use std::path::{Path, PathBuf};

/// Resolve config file arguments against the working directory.
fn resolve_files(cwd: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    files.iter().map(|f| cwd.join(f)).collect()
}
