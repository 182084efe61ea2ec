//! Include/exclude/legal path filtering of staged trees
//!
//! Patterns are matched against file paths relative to the filtered root,
//! using forward slashes. `*` stays within one path segment and `**` spans
//! any number of segments.
//!
//! # Precedence
//!
//! | Rule | Effect |
//! |------|--------|
//! | no include and no exclude patterns | filter is a no-op, tree left as fetched |
//! | no include patterns | keep by default |
//! | matches an include pattern | keep |
//! | matches an exclude pattern | drop (overrides include) |
//! | matches a legal pattern | keep (overrides exclude) |
//!
//! Only files and symlinks are filtered, but a pattern naming a directory
//! applies to everything below it. Directories left without any file in
//! their subtree are pruned afterwards. A no-op filter prunes nothing, so
//! empty directories shipped by the source survive.

use std::fs;
use std::path::Path;

use glob_match::glob_match;
use walkdir::WalkDir;

use crate::{Error, NormalizedPath, Result, io::walk_error};

/// License-like files kept regardless of include/exclude rules when no
/// legal patterns are configured.
pub const DEFAULT_LEGAL_PATHS: &[&str] = &[
    "{LICENSE,LICENCE,License,Licence,license,licence}",
    "{LICENSE,LICENCE,License,Licence,license,licence}.{md,txt,rst}",
    "{COPYRIGHT,Copyright,copyright}",
    "{COPYRIGHT,Copyright,copyright}.{md,txt,rst}",
    "{NOTICE,Notice,notice}",
    "{NOTICE,Notice,notice}.{md,txt,rst}",
];

/// Compiled include/exclude/legal rules for one content entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    legal: Vec<String>,
}

impl FileFilter {
    /// Build a filter, validating every pattern.
    ///
    /// An empty `legal` list falls back to [`DEFAULT_LEGAL_PATHS`].
    pub fn new(include: &[String], exclude: &[String], legal: &[String]) -> Result<Self> {
        let legal = if legal.is_empty() {
            DEFAULT_LEGAL_PATHS.iter().map(|p| p.to_string()).collect()
        } else {
            scope_patterns(legal)?
        };

        Ok(Self {
            include: scope_patterns(include)?,
            exclude: scope_patterns(exclude)?,
            legal,
        })
    }

    /// A filter without include or exclude rules keeps everything.
    pub fn is_noop(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Decide whether the file at `relative` (forward slashes) survives.
    pub fn keep(&self, relative: &str) -> bool {
        let mut keep = self.include.is_empty();
        if matches_any(&self.include, relative) {
            keep = true;
        }
        if matches_any(&self.exclude, relative) {
            keep = false;
        }
        if matches_any(&self.legal, relative) {
            keep = true;
        }
        keep
    }

    /// Delete every file under `root` that is not kept, then prune
    /// directories left without files.
    ///
    /// Returns the number of files removed.
    pub fn apply(&self, root: &Path) -> Result<usize> {
        if self.is_noop() {
            return Ok(0);
        }

        let mut doomed = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::internal(format!("walked outside of {}", root.display())))?;
            let relative = NormalizedPath::new(relative);
            if !self.keep(relative.as_str()) {
                doomed.push(entry.into_path());
            }
        }

        for path in &doomed {
            fs::remove_file(path).map_err(|e| Error::io("remove file", path, e))?;
        }
        tracing::debug!(root = %root.display(), removed = doomed.len(), "applied file filter");

        prune_empty_dirs(root)?;
        Ok(doomed.len())
    }
}

/// Remove every directory below `root` whose subtree contains no file.
///
/// `root` itself is kept even when empty.
pub fn prune_empty_dirs(root: &Path) -> Result<()> {
    prune_dir(root, true).map(|_| ())
}

/// Returns whether `dir` still holds at least one file in its subtree.
fn prune_dir(dir: &Path, is_root: bool) -> Result<bool> {
    let mut has_files = false;

    let entries = fs::read_dir(dir).map_err(|e| Error::io("read directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io("read directory", dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io("inspect", entry.path(), e))?;

        if file_type.is_dir() {
            has_files |= prune_dir(&entry.path(), false)?;
        } else {
            has_files = true;
        }
    }

    if !has_files && !is_root {
        // Empty children were removed by the recursion above
        let leftover = fs::read_dir(dir)
            .map_err(|e| Error::io("read directory", dir, e))?
            .next()
            .is_some();
        if leftover {
            return Err(Error::internal(format!(
                "expected directory {} to be empty before pruning",
                dir.display()
            )));
        }
        fs::remove_dir(dir).map_err(|e| Error::io("remove directory", dir, e))?;
    }

    Ok(has_files)
}

/// A pattern matches a file when it matches the file path itself or any
/// directory the file lives under, so `a/b` covers `a/b/c`.
fn matches_any(patterns: &[String], relative: &str) -> bool {
    let mut ancestors = relative
        .match_indices('/')
        .map(|(idx, _)| &relative[..idx])
        .chain(std::iter::once(relative));

    ancestors.any(|candidate| patterns.iter().any(|pattern| glob_match(pattern, candidate)))
}

fn scope_patterns(patterns: &[String]) -> Result<Vec<String>> {
    patterns
        .iter()
        .map(|pattern| {
            validate_pattern(pattern)?;
            Ok(scope_pattern(pattern))
        })
        .collect()
}

/// Drop empty and `.` segments so `./a//b/` matches like `a/b`.
///
/// Unlike [`NormalizedPath`], backslashes are left alone since they escape
/// glob metacharacters.
fn scope_pattern(pattern: &str) -> String {
    pattern
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject patterns that can never match a path relative to the filtered root.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    let invalid = |message: &str| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: message.to_string(),
    };

    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if pattern.starts_with('/') {
        return Err(invalid("pattern must be relative"));
    }

    let mut brackets = 0usize;
    let mut braces = 0usize;
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => brackets += 1,
            ']' => {
                brackets = brackets
                    .checked_sub(1)
                    .ok_or_else(|| invalid("unmatched ']'"))?
            }
            '{' => braces += 1,
            '}' => braces = braces.checked_sub(1).ok_or_else(|| invalid("unmatched '}'"))?,
            _ => {}
        }
    }

    if brackets > 0 {
        return Err(invalid("unclosed '['"));
    }
    if braces > 0 {
        return Err(invalid("unclosed '{'"));
    }
    Ok(())
}
