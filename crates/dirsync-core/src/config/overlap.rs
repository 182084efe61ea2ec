//! Rejection of nested or coinciding managed paths

use dirsync_fs::NormalizedPath;

use super::Config;
use crate::{Error, Result};

/// Fail when two managed destinations nest or coincide.
///
/// Checks, in order:
/// - an entire-directory content (`.`) is the only content of its directory
/// - no two directory paths nest, since each directory is replaced whole
/// - no two content destinations (directory joined with content path) nest,
///   across the whole config
pub fn validate_overlap(config: &Config) -> Result<()> {
    for directory in &config.directories {
        let entire = directory
            .contents
            .iter()
            .filter(|c| c.is_entire_directory())
            .count();
        if entire > 0 && directory.contents.len() > 1 {
            return Err(Error::config(format!(
                "Expected entire directory content to be the only content of directory '{}'",
                directory.path
            )));
        }
    }

    let directories: Vec<NormalizedPath> =
        config.directories.iter().map(|d| d.path.clone()).collect();
    check_pairwise(&directories)?;

    let contents: Vec<NormalizedPath> = config
        .directories
        .iter()
        .flat_map(|d| d.contents.iter().map(|c| c.full_path(&d.path)))
        .collect();
    check_pairwise(&contents)
}

fn check_pairwise(paths: &[NormalizedPath]) -> Result<()> {
    for (i, first) in paths.iter().enumerate() {
        for second in &paths[i + 1..] {
            if first.is_within(second) || second.is_within(first) {
                return Err(Error::OverlappingPaths {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }
    Ok(())
}
