//! Validate command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use dirsync_core::load_files;

use super::resolve_files;
use crate::error::Result;

/// Run the validate command in `cwd`
pub fn run_validate(cwd: &Path, files: &[PathBuf]) -> Result<()> {
    let loaded = load_files(&resolve_files(cwd, files))?;
    loaded.config.validate()?;

    let contents: usize = loaded
        .config
        .directories
        .iter()
        .map(|d| d.contents.len())
        .sum();
    println!(
        "{} {} directories, {} contents",
        "OK".green().bold(),
        loaded.config.directories.len(),
        contents
    );
    Ok(())
}
