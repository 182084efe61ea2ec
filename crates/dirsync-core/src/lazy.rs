//! Lazy sync: skip re-fetching contents whose declaration is unchanged

use dirsync_fs::digest::sha256_digest;

use crate::Result;
use crate::config::Content;

/// Outcome of [`decide`] for one content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyDecision {
    /// Reuse the content already on disk instead of invoking its syncer
    pub skip_fetch: bool,
    /// Record the new digest in the lock entry
    pub persist_digest: bool,
}

/// Stable digest of a declared content entry.
///
/// Covers the source, filters, permissions and relocation, so any change
/// to the entry forces a fetch. Map-valued fields are ordered by key, so
/// reordering them does not change the digest.
pub fn config_digest(content: &Content) -> Result<String> {
    let canonical = serde_json::to_string(content)?;
    Ok(sha256_digest(canonical.as_bytes()))
}

/// Decide whether a content may skip fetching.
///
/// `allow_lazy` is the run-wide switch; when off, nothing is skipped but
/// opted-in contents still record their digest for the next run.
pub fn decide(old: Option<&str>, new: &str, allow_lazy: bool, opts_in: bool) -> LazyDecision {
    let unchanged = old.is_some_and(|old| !old.is_empty() && old == new);
    LazyDecision {
        skip_fetch: opts_in && allow_lazy && unchanged,
        persist_digest: opts_in,
    }
}
