//! `manual`: keep whatever is on disk

use std::fs;
use std::path::{Path, PathBuf};

use dirsync_fs::{TempArea, io};

use super::{SourceSyncer, SyncContext, io_error, misdispatched};
use crate::config::{Source, SourceKind};
use crate::lock::{LockSource, ManualLock};
use crate::{Error, Result};

/// Carries the current on-disk content over into the staged directory.
#[derive(Debug, Clone)]
pub struct ManualSyncer {
    existing: PathBuf,
}

impl ManualSyncer {
    pub fn new(existing: impl Into<PathBuf>) -> Self {
        Self {
            existing: existing.into(),
        }
    }
}

pub(super) fn build(source: &Source, ctx: &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> {
    match source {
        Source::Manual(_) => Ok(Box::new(ManualSyncer::new(ctx.existing))),
        other => Err(misdispatched(SourceKind::Manual, other)),
    }
}

impl SourceSyncer for ManualSyncer {
    fn sync(&self, dst: &Path, _temp: &dyn TempArea) -> Result<LockSource> {
        if self.existing.is_dir() {
            io::copy_tree(&self.existing, dst)?;
        } else if self.existing.exists() {
            return Err(Error::fetch(format!(
                "Expected manual content '{}' to be a directory",
                self.existing.display()
            )));
        } else {
            fs::create_dir_all(dst).map_err(|e| io_error("create directory", dst, e))?;
        }
        Ok(LockSource::Manual(ManualLock {}))
    }
}
