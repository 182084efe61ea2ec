//! Normalized path handling for declared directory and content paths

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A lexically cleaned path using forward slashes internally.
///
/// Cleaning collapses repeated separators, drops `.` segments, resolves
/// `..` against preceding segments and strips trailing separators, so
/// `vendor/foo/..//` becomes `vendor` and `bar///baz/.` becomes `bar/baz`.
/// An empty input cleans to `.`. Leading `..` segments of relative paths
/// are kept; they are rejected by validation where they matter.
///
/// Cleaning is idempotent and purely lexical: the filesystem is never
/// consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self { inner: clean(&raw) }
    }

    /// The path denoting "the whole owning directory".
    pub fn dot() -> Self {
        Self {
            inner: ".".to_string(),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Whether this path is `.`.
    pub fn is_dot(&self) -> bool {
        self.inner == "."
    }

    /// Whether this path is absolute.
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/')
    }

    /// Whether this relative path climbs out of its base through a leading `..`.
    pub fn escapes_base(&self) -> bool {
        self.inner == ".." || self.inner.starts_with("../")
    }

    /// Join this path with a segment and clean the result.
    pub fn join(&self, segment: impl AsRef<Path>) -> Self {
        let segment = segment.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: clean(&format!("{}/{}", self.inner, segment)),
        }
    }

    /// Whether `self` equals `other` or is nested anywhere below it.
    ///
    /// Comparison is segment-wise: `vendor-x` is not inside `vendor`.
    pub fn is_within(&self, other: &Self) -> bool {
        if self.inner == other.inner || (other.is_dot() && !self.is_absolute()) {
            return true;
        }
        if other.inner == "/" {
            return self.is_absolute();
        }
        self.inner
            .strip_prefix(other.inner.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Lexically clean a forward-slash path.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `/..` is `/`
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Reject paths that cannot name a managed location.
///
/// Fails if the cleaned path is empty, `.`, `..` or `/`.
pub fn validate_managed_path(path: &NormalizedPath) -> Result<()> {
    match path.as_str() {
        "" | "." | ".." | "/" => Err(Error::DisallowedPath {
            path: path.as_str().to_string(),
        }),
        _ => Ok(()),
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl From<NormalizedPath> for String {
    fn from(p: NormalizedPath) -> Self {
        p.inner
    }
}
