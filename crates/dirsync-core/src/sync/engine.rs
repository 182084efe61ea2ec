//! SyncEngine implementation

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dirsync_fs::{NormalizedPath, StagingArea, TempArea, io, validate_symlinks};

use crate::config::{Config, Content, Directory, DirectorySource, Source, SourceKind};
use crate::lazy;
use crate::lock::{LockConfig, LockContent, LockDirectory};
use crate::secrets::{DocumentSecrets, SecretLookup};
use crate::syncer::{SyncContext, SyncerRegistry};
use crate::{Error, Result};

/// Sync only the directory owning one content, optionally from a local copy.
///
/// Parsed from `PATH` or `PATH=LOCAL_DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOverride {
    /// Full destination of the content (directory joined with content path)
    pub path: NormalizedPath,
    /// Local directory used instead of the declared source
    pub local_dir: Option<String>,
}

impl FromStr for DirectoryOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (path, local_dir) = match s.split_once('=') {
            Some((path, local)) => (path, Some(local)),
            None => (s, None),
        };
        if path.trim().is_empty() {
            return Err(Error::config(format!(
                "Expected directory override '{s}' to name a path"
            )));
        }
        if local_dir.is_some_and(|l| l.trim().is_empty()) {
            return Err(Error::config(format!(
                "Expected directory override '{s}' to name a local directory after '='"
            )));
        }
        Ok(Self {
            path: NormalizedPath::new(path),
            local_dir: local_dir.map(str::to_string),
        })
    }
}

/// Options for [`SyncEngine::sync`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Replay the resolved identifiers of the existing lock file
    pub locked: bool,
    /// Run-wide switch for lazy contents
    pub allow_lazy: bool,
    /// Restrict the run to the directories owning these contents
    pub directory_overrides: Vec<DirectoryOverride>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            locked: false,
            allow_lazy: true,
            directory_overrides: Vec::new(),
        }
    }
}

/// What a sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Directories replaced, in processing order
    pub directories: Vec<NormalizedPath>,
    /// Contents whose syncer ran
    pub fetched: Vec<NormalizedPath>,
    /// Lazy contents reused from disk
    pub skipped: Vec<NormalizedPath>,
    /// Whether the lock file was (re)written
    pub lock_updated: bool,
}

/// A content ready to be synced.
struct PlannedContent {
    content: Content,
    /// Digest of the content as declared
    digest: String,
    previous: Option<LockContent>,
}

struct PlannedDirectory {
    directory: Directory,
    contents: Vec<PlannedContent>,
}

/// Engine populating managed directories from their sources.
pub struct SyncEngine {
    /// Working directory; relative paths resolve against it
    base: PathBuf,
    registry: SyncerRegistry,
    secrets: Box<dyn SecretLookup>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("base", &self.base)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// An engine with the built-in syncers and no secrets.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            registry: SyncerRegistry::with_builtins(),
            secrets: Box::new(DocumentSecrets::default()),
        }
    }

    pub fn with_registry(mut self, registry: SyncerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_secrets(mut self, secrets: impl SecretLookup + 'static) -> Self {
        self.secrets = Box::new(secrets);
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Sync every directory of `config` and write the lock to `lock_path`.
    ///
    /// The first failure aborts the run. Directories replaced before the
    /// failure stay replaced; the others and the lock file are untouched.
    pub fn sync(&self, config: &Config, lock_path: &Path, options: &SyncOptions) -> Result<SyncReport> {
        config.validate()?;

        let lock_path = self.base.join(lock_path);
        let existing = LockConfig::load_if_exists(&lock_path)?;
        if options.locked && existing.is_none() {
            return Err(Error::LockMissing { path: lock_path });
        }

        let plan = self.plan(config, existing.as_ref(), options)?;

        let staging = StagingArea::new(&self.base);
        let mut report = SyncReport::default();
        let mut synced = LockConfig::new();

        for planned in &plan {
            let path = &planned.directory.path;
            tracing::info!(path = %path, "syncing directory");
            let locked = self
                .sync_directory(planned, &staging, options, &mut report)
                .map_err(|e| Error::Directory {
                    path: path.to_string(),
                    source: Box::new(e),
                })?;
            synced.directories.push(locked);
        }
        staging.clean_up()?;

        let lock = if options.directory_overrides.is_empty() {
            synced
        } else {
            fold_into(existing.unwrap_or_default(), synced)
        };
        report.lock_updated = lock.write_to_file(&lock_path)?;

        tracing::info!(
            directories = report.directories.len(),
            fetched = report.fetched.len(),
            skipped = report.skipped.len(),
            lock_updated = report.lock_updated,
            "sync complete"
        );
        Ok(report)
    }

    /// Resolve digests, lock pins and overrides before touching anything.
    fn plan(
        &self,
        config: &Config,
        existing: Option<&LockConfig>,
        options: &SyncOptions,
    ) -> Result<Vec<PlannedDirectory>> {
        let selected = select_directories(config, &options.directory_overrides)?;

        let mut plan = Vec::new();
        for (index, directory) in config.directories.iter().enumerate() {
            if selected.as_ref().is_some_and(|s| !s.contains(&index)) {
                continue;
            }

            let mut contents = Vec::new();
            for content in &directory.contents {
                let full_path = content.full_path(&directory.path);
                let digest = lazy::config_digest(content)?;
                let previous = existing
                    .and_then(|lock| lock.find_content(&directory.path, &content.path))
                    .cloned();

                let mut content = content.clone();
                if options.locked {
                    let entry = previous.as_ref().ok_or_else(|| Error::LockEntryMissing {
                        path: full_path.to_string(),
                    })?;
                    content.source.apply_lock(full_path.as_str(), &entry.source)?;
                }

                let local = options
                    .directory_overrides
                    .iter()
                    .find(|o| o.path == full_path)
                    .and_then(|o| o.local_dir.as_ref());
                if let Some(local) = local {
                    tracing::debug!(path = %full_path, local = %local, "using local directory override");
                    content.source = Source::Directory(DirectorySource {
                        path: local.clone(),
                    });
                    content.lazy = false;
                }

                contents.push(PlannedContent {
                    content,
                    digest,
                    previous,
                });
            }

            plan.push(PlannedDirectory {
                directory: directory.clone(),
                contents,
            });
        }
        Ok(plan)
    }

    fn sync_directory(
        &self,
        planned: &PlannedDirectory,
        staging: &StagingArea,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<LockDirectory> {
        let directory = &planned.directory;
        let final_path = directory.final_path(&self.base);
        staging.prepare()?;

        let mut contents = Vec::new();
        for planned_content in &planned.contents {
            let content = &planned_content.content;
            let locked = self
                .sync_content(directory, planned_content, staging, options, report)
                .map_err(|e| Error::Content {
                    path: content.path.to_string(),
                    kind: content.source.kind().label(),
                    source: Box::new(e),
                })?;
            contents.push(locked);
        }

        if let Some(permissions) = directory.permissions {
            io::set_mode(staging.staging_dir(), permissions.mode())?;
        }
        staging.replace(&final_path)?;
        report.directories.push(directory.path.clone());

        Ok(LockDirectory {
            path: directory.path.clone(),
            contents,
        })
    }

    fn sync_content(
        &self,
        directory: &Directory,
        planned: &PlannedContent,
        staging: &StagingArea,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<LockContent> {
        let content = &planned.content;
        let full_path = content.full_path(&directory.path);
        let existing_path = self.base.join(full_path.to_native());
        let dst = staging.new_child(&content.path)?;

        let previous_digest = planned
            .previous
            .as_ref()
            .and_then(|p| p.config_digest.as_deref());
        let decision = lazy::decide(
            previous_digest,
            &planned.digest,
            options.allow_lazy,
            content.lazy,
        );
        let config_digest = decision.persist_digest.then(|| planned.digest.clone());

        if decision.skip_fetch
            && existing_path.is_dir()
            && let Some(previous) = &planned.previous
        {
            tracing::info!(path = %full_path, "skipping unchanged lazy content");
            io::copy_tree(&existing_path, &dst)?;
            report.skipped.push(full_path);
            return Ok(LockContent {
                path: content.path.clone(),
                config_digest,
                source: previous.source.clone(),
            });
        }

        let kind = content.source.kind();
        tracing::info!(path = %full_path, kind = kind.label(), "fetching content");
        let ctx = SyncContext {
            base: &self.base,
            existing: &existing_path,
            secrets: self.secrets.as_ref(),
        };
        let syncer = self.registry.build(&content.source, &ctx)?;
        let source = syncer.sync(&dst, staging)?;

        if !dst.is_dir() {
            return Err(Error::internal(format!(
                "{kind} syncer reported success without populating {}",
                dst.display()
            )));
        }
        if source.kind() != kind {
            return Err(Error::internal(format!(
                "{kind} syncer returned a {} lock entry",
                source.kind()
            )));
        }

        if kind != SourceKind::Inline {
            validate_symlinks(&dst)?;
        }
        content.filter()?.apply(&dst)?;
        if let Some(new_root) = &content.new_root_path {
            promote_new_root(&dst, new_root, staging)?;
            // Relative links resolve differently once their subtree moved up
            if kind != SourceKind::Inline {
                validate_symlinks(&dst)?;
            }
        }
        if let Some(permissions) = content.permissions {
            io::set_mode(&dst, permissions.mode())?;
        }

        report.fetched.push(full_path);
        Ok(LockContent {
            path: content.path.clone(),
            config_digest,
            source,
        })
    }
}

/// Indices of the directories owning the overridden contents, or `None`
/// when there are no overrides.
fn select_directories(
    config: &Config,
    overrides: &[DirectoryOverride],
) -> Result<Option<BTreeSet<usize>>> {
    if overrides.is_empty() {
        return Ok(None);
    }

    let mut selected = BTreeSet::new();
    for directory_override in overrides {
        let owners: Vec<usize> = config
            .directories
            .iter()
            .enumerate()
            .flat_map(|(index, directory)| {
                directory
                    .contents
                    .iter()
                    .filter(|c| c.full_path(&directory.path) == directory_override.path)
                    .map(move |_| index)
            })
            .collect();

        match owners.as_slice() {
            [index] => {
                selected.insert(*index);
            }
            _ => {
                return Err(Error::OverrideMismatch {
                    path: directory_override.path.to_string(),
                    matched: owners.len(),
                });
            }
        }
    }
    Ok(Some(selected))
}

/// Make the `new_root` subtree of `dst` the content root, dropping the rest.
fn promote_new_root(dst: &Path, new_root: &NormalizedPath, temp: &dyn TempArea) -> Result<()> {
    let subtree = dst.join(new_root.to_native());
    let is_dir = fs::symlink_metadata(&subtree).is_ok_and(|m| m.is_dir());
    if !is_dir {
        return Err(Error::NewRootMissing {
            path: new_root.to_string(),
        });
    }

    let holding = temp.temp_dir("new-root")?;
    let held = holding.path().join("root");
    io::move_dir(&subtree, &held)?;
    io::move_dir(&held, dst)?;
    Ok(())
}

/// Fold the lock entries of a partial run into the existing lock.
fn fold_into(mut lock: LockConfig, partial: LockConfig) -> LockConfig {
    for directory in partial.directories {
        for content in directory.contents {
            let full_path = directory.path.join(content.path.as_str());
            if lock.replace_contents(&full_path, content.clone()) {
                continue;
            }
            if lock.append_contents(&directory.path, content.clone()) {
                continue;
            }
            lock.merge(LockConfig {
                directories: vec![LockDirectory {
                    path: directory.path.clone(),
                    contents: vec![content],
                }],
                ..LockConfig::new()
            });
        }
    }
    lock
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockSource, ManualLock};
    use pretty_assertions::assert_eq;

    #[test]
    fn override_parses_path_and_local_dir() {
        let plain: DirectoryOverride = "vendor/repo/".parse().unwrap();
        assert_eq!(plain.path.as_str(), "vendor/repo");
        assert_eq!(plain.local_dir, None);

        let local: DirectoryOverride = "vendor/repo=../checkout".parse().unwrap();
        assert_eq!(local.local_dir.as_deref(), Some("../checkout"));

        assert!("=x".parse::<DirectoryOverride>().is_err());
        assert!("vendor=".parse::<DirectoryOverride>().is_err());
    }

    #[test]
    fn fold_replaces_appends_then_merges() {
        let manual = |path: &str| LockContent::new(path, LockSource::Manual(ManualLock {}));
        let mut existing = LockConfig::new();
        existing.directories.push(LockDirectory {
            path: NormalizedPath::new("vendor"),
            contents: vec![manual("a")],
        });

        let mut partial = LockConfig::new();
        let mut replaced = manual("a");
        replaced.config_digest = Some("sha256:x".to_string());
        partial.directories.push(LockDirectory {
            path: NormalizedPath::new("vendor"),
            contents: vec![replaced, manual("b")],
        });
        partial.directories.push(LockDirectory {
            path: NormalizedPath::new("other"),
            contents: vec![manual("c")],
        });

        let folded = fold_into(existing, partial);

        assert_eq!(folded.directories.len(), 2);
        let vendor = &folded.directories[0];
        assert_eq!(vendor.contents.len(), 2);
        assert_eq!(vendor.contents[0].config_digest.as_deref(), Some("sha256:x"));
        assert_eq!(vendor.contents[1].path.as_str(), "b");
        assert_eq!(folded.directories[1].path.as_str(), "other");
    }
}
