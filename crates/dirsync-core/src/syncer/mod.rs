//! Source syncers: one fetch implementation per content source kind
//!
//! The engine never fetches anything itself. For each content it asks the
//! [`SyncerRegistry`] for a [`SourceSyncer`] matching the content's
//! [`SourceKind`], then hands it a destination inside the staging tree.

mod directory;
mod git;
mod inline;
mod manual;

use std::collections::HashMap;
use std::path::Path;

use dirsync_fs::TempArea;

pub use directory::DirectorySyncer;
pub use git::GitSyncer;
pub use inline::InlineSyncer;
pub use manual::ManualSyncer;

use crate::config::{Source, SourceKind};
use crate::lock::LockSource;
use crate::secrets::SecretLookup;
use crate::{Error, Result};

/// Populates one content destination.
///
/// Implementations must only write below `dst` and inside allocations made
/// from `temp`. On success `dst` exists and is fully populated; on failure
/// it may be absent or partial, and the run is aborted.
pub trait SourceSyncer {
    /// Fetch into `dst` and report the resolved identifier for the lock.
    ///
    /// The returned lock source never carries credentials.
    fn sync(&self, dst: &Path, temp: &dyn TempArea) -> Result<LockSource>;
}

/// What a syncer factory may consult while building a syncer.
pub struct SyncContext<'a> {
    /// Working directory that relative local paths resolve against
    pub base: &'a Path,
    /// Current on-disk location of the content being synced
    pub existing: &'a Path,
    pub secrets: &'a dyn SecretLookup,
}

/// Builds a syncer for a source, resolving secrets and local paths up front.
pub type SyncerFactory = Box<dyn Fn(&Source, &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>>>;

/// Maps source kinds to syncer factories.
pub struct SyncerRegistry {
    factories: HashMap<SourceKind, SyncerFactory>,
}

impl std::fmt::Debug for SyncerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&SourceKind> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("SyncerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl Default for SyncerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl SyncerRegistry {
    /// A registry without any syncer.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in `manual`, `directory`, `inline` and
    /// `git` syncers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(SourceKind::Manual, manual::build);
        registry.register(SourceKind::Directory, directory::build);
        registry.register(SourceKind::Inline, inline::build);
        registry.register(SourceKind::Git, git::build);
        registry
    }

    /// Register `factory` for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: SourceKind, factory: F)
    where
        F: Fn(&Source, &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn supports(&self, kind: SourceKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the syncer for `source`.
    pub fn build(&self, source: &Source, ctx: &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> {
        let kind = source.kind();
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| Error::UnsupportedSource {
                kind: kind.label().to_string(),
            })?;
        factory(source, ctx)
    }
}

pub(crate) fn io_error(operation: &'static str, path: &Path, source: std::io::Error) -> Error {
    dirsync_fs::Error::io(operation, path, source).into()
}

/// Error for a factory handed a source of another kind.
pub(crate) fn misdispatched(expected: SourceKind, source: &Source) -> Error {
    Error::internal(format!(
        "{} source dispatched to the {expected} syncer",
        source.kind()
    ))
}
