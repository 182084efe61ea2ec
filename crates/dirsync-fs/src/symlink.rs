//! Symlink containment checks for fetched trees

use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::{Error, Result, io::walk_error};

/// Verify that every symlink under `root` resolves inside `root`.
///
/// Each link is resolved to an absolute path (following chains of links).
/// The resolved path must be `root` itself or nested below it, compared
/// segment by segment. A link whose target cannot be resolved, for example
/// because it does not exist, is rejected as well.
pub fn validate_symlinks(root: &Path) -> Result<()> {
    let root_abs = dunce::canonicalize(root).map_err(|e| Error::io("resolve", root, e))?;
    let root_segments: Vec<Component<'_>> = root_abs.components().collect();

    for entry in WalkDir::new(&root_abs).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(&root_abs, e))?;
        if !entry.path_is_symlink() {
            continue;
        }

        let target =
            dunce::canonicalize(entry.path()).map_err(|source| Error::SymlinkUnresolvable {
                path: entry.path().to_path_buf(),
                source,
            })?;
        let target_segments: Vec<Component<'_>> = target.components().collect();

        let contained = target_segments.len() >= root_segments.len()
            && target_segments[..root_segments.len()] == root_segments[..];
        if !contained {
            return Err(Error::SymlinkEscape {
                target,
                root: root_abs.clone(),
            });
        }
        tracing::trace!(link = %entry.path().display(), target = %target.display(), "symlink contained");
    }

    Ok(())
}
