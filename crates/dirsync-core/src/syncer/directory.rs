//! `directory`: copy of a local directory

use std::path::{Path, PathBuf};

use dirsync_fs::staging::ROOT_PREFIX;
use dirsync_fs::{TempArea, io};

use super::{SourceSyncer, SyncContext, misdispatched};
use crate::config::{Source, SourceKind};
use crate::lock::{DirectoryLock, LockSource};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct DirectorySyncer {
    src: PathBuf,
}

impl DirectorySyncer {
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Self { src: src.into() }
    }
}

pub(super) fn build(source: &Source, ctx: &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> {
    match source {
        Source::Directory(local) => Ok(Box::new(DirectorySyncer::new(ctx.base.join(&local.path)))),
        other => Err(misdispatched(SourceKind::Directory, other)),
    }
}

impl SourceSyncer for DirectorySyncer {
    fn sync(&self, dst: &Path, _temp: &dyn TempArea) -> Result<LockSource> {
        if !self.src.is_dir() {
            return Err(Error::fetch(format!(
                "Expected local directory '{}' to exist",
                self.src.display()
            )));
        }

        // A source that contains the working directory would otherwise
        // copy the staging tree into itself
        io::copy_tree_filtered(&self.src, dst, |rel| {
            rel.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(ROOT_PREFIX))
        })?;
        tracing::debug!(src = %self.src.display(), dst = %dst.display(), "copied local directory");
        Ok(LockSource::Directory(DirectoryLock {}))
    }
}
