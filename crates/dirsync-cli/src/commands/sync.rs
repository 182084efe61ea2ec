//! Sync command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use dirsync_core::{DirectoryOverride, SyncEngine, SyncOptions, load_files};

use super::resolve_files;
use crate::error::Result;

/// Arguments of `dirsync sync`
#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub files: Vec<PathBuf>,
    pub lock_file: PathBuf,
    pub locked: bool,
    pub lazy: bool,
    pub directories: Vec<DirectoryOverride>,
}

/// Run the sync command in `cwd`
pub fn run_sync(cwd: &Path, args: SyncArgs) -> Result<()> {
    let loaded = load_files(&resolve_files(cwd, &args.files))?;
    let engine = SyncEngine::new(cwd).with_secrets(loaded.secrets);
    let options = SyncOptions {
        locked: args.locked,
        allow_lazy: args.lazy,
        directory_overrides: args.directories,
    };

    let report = engine.sync(&loaded.config, &args.lock_file, &options)?;

    for path in &report.skipped {
        println!("{} {} (unchanged)", "skipped".yellow().bold(), path);
    }
    for path in &report.directories {
        println!("{} {}", "synced".green().bold(), path);
    }
    if report.lock_updated {
        println!(
            "{} {}",
            "Lock config written to".green(),
            args.lock_file.display()
        );
    } else {
        println!("{}", "Lock config unchanged".dimmed());
    }
    Ok(())
}
