//! dirsync CLI
//!
//! Populates directories from the sources declared in `dirsync.yml` and
//! records what was fetched in `dirsync.lock.yml`.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::SyncArgs;
use error::{Result, error_chain};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), error_chain(&e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match cli.chdir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    tracing::debug!(cwd = %cwd.display(), "resolved working directory");

    execute_command(&cwd, cli.command)
}

/// Log to stderr; `--verbose` forces debug, otherwise `RUST_LOG` or warn.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

fn execute_command(cwd: &std::path::Path, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Sync {
            files,
            lock_file,
            locked,
            lazy,
            directories,
        } => commands::run_sync(
            cwd,
            SyncArgs {
                files,
                lock_file,
                locked,
                lazy,
                directories,
            },
        ),
        Commands::Validate { files } => commands::run_validate(cwd, &files),
    }
}
