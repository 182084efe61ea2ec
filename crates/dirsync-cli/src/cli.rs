//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use dirsync_core::DirectoryOverride;
use dirsync_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_LOCK_FILE};

/// dirsync - Populate directories from declared sources and lock what was fetched
#[derive(Parser, Debug)]
#[command(name = "dirsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run as if started in DIR
    #[arg(long, global = true, value_name = "DIR", env = "DIRSYNC_CHDIR")]
    pub chdir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sync every managed directory and update the lock file
    ///
    /// Examples:
    ///   dirsync sync                          # Use dirsync.yml
    ///   dirsync sync --locked                 # Replay dirsync.lock.yml
    ///   dirsync sync -d vendor/lib=../lib     # Sync one content from a local copy
    Sync {
        /// Config files; documents from all files are merged
        #[arg(short, long = "file", value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
        files: Vec<PathBuf>,

        /// Lock file to read and write
        #[arg(long, value_name = "FILE", default_value = DEFAULT_LOCK_FILE)]
        lock_file: PathBuf,

        /// Use the resolved identifiers from the lock file
        #[arg(long)]
        locked: bool,

        /// Allow lazy contents to skip fetching while unchanged
        #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
        lazy: bool,

        /// Only sync the directory owning this content, optionally from a local directory
        #[arg(short, long = "directory", value_name = "PATH[=LOCAL_DIR]")]
        directories: Vec<DirectoryOverride>,
    },

    /// Load and validate config files without fetching anything
    Validate {
        /// Config files; documents from all files are merged
        #[arg(short, long = "file", value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
        files: Vec<PathBuf>,
    },
}
