//! `inline`: literal files and Secret/ConfigMap keys

use std::fs;
use std::path::Path;

use dirsync_fs::{NormalizedPath, TempArea};

use super::{SourceSyncer, SyncContext, io_error, misdispatched};
use crate::config::{InlineSource, Source, SourceKind};
use crate::lock::{InlineLock, LockSource};
use crate::secrets::SecretLookup;
use crate::{Error, Result};

/// Writes a fixed set of files, resolved when the syncer is built.
#[derive(Debug, Clone, Default)]
pub struct InlineSyncer {
    files: Vec<(NormalizedPath, Vec<u8>)>,
}

impl InlineSyncer {
    /// Resolve literal paths and every key of each referenced record.
    pub fn resolve(inline: &InlineSource, secrets: &dyn SecretLookup) -> Result<Self> {
        let mut files = Vec::new();
        for (path, text) in &inline.paths {
            files.push((file_path(&NormalizedPath::dot(), path)?, text.clone().into_bytes()));
        }

        for entry in &inline.paths_from {
            if let Some(secret_ref) = &entry.secret_ref {
                let dir = ref_dir(secret_ref.directory_path.as_deref());
                for (key, value) in secrets.get_secret(&secret_ref.name)?.data {
                    files.push((file_path(&dir, &key)?, value));
                }
            }
            if let Some(config_map_ref) = &entry.config_map_ref {
                let dir = ref_dir(config_map_ref.directory_path.as_deref());
                for (key, value) in secrets.get_config_map(&config_map_ref.name)?.data {
                    files.push((file_path(&dir, &key)?, value.into_bytes()));
                }
            }
        }

        Ok(Self { files })
    }
}

fn ref_dir(directory_path: Option<&str>) -> NormalizedPath {
    directory_path.map_or_else(NormalizedPath::dot, NormalizedPath::new)
}

fn file_path(dir: &NormalizedPath, name: &str) -> Result<NormalizedPath> {
    let path = dir.join(name);
    if path.is_dot() || path.is_absolute() || path.escapes_base() {
        return Err(Error::config(format!(
            "Expected inline path '{name}' to name a file within its content"
        )));
    }
    Ok(path)
}

pub(super) fn build(source: &Source, ctx: &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> {
    match source {
        Source::Inline(inline) => Ok(Box::new(InlineSyncer::resolve(inline, ctx.secrets)?)),
        other => Err(misdispatched(SourceKind::Inline, other)),
    }
}

impl SourceSyncer for InlineSyncer {
    fn sync(&self, dst: &Path, _temp: &dyn TempArea) -> Result<LockSource> {
        fs::create_dir_all(dst).map_err(|e| io_error("create directory", dst, e))?;

        for (relative, bytes) in &self.files {
            let target = dst.join(relative.to_native());
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;
            }
            fs::write(&target, bytes).map_err(|e| io_error("write", &target, e))?;
        }

        tracing::debug!(dst = %dst.display(), files = self.files.len(), "wrote inline content");
        Ok(LockSource::Inline(InlineLock {}))
    }
}
