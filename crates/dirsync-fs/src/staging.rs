//! Per-run staging area
//!
//! A [`StagingArea`] owns a working root with two subtrees:
//!
//! - `staging`: the directory being assembled, later renamed into place
//! - `incoming`: scratch space handed to source syncers via [`TempArea`]
//!
//! The root name carries a per-run unique suffix so concurrent runs sharing
//! a working directory never collide. The root is removed on
//! [`StagingArea::clean_up`] and again when the value is dropped.
//!
//! A live run holds an exclusive lock on an owner file inside its root.
//! Roots left behind by killed runs have no lock holder, so the first
//! [`StagingArea::prepare`] of a later run removes them.

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::{NamedTempFile, TempDir};
use uuid::Uuid;

use crate::{Error, NormalizedPath, Result, io};

/// Prefix of every staging root created by [`StagingArea::new`].
pub const ROOT_PREFIX: &str = ".dirsync-tmp";

const STAGING_DIR: &str = "staging";
const INCOMING_DIR: &str = "incoming";
const OWNER_FILE: &str = ".owner";

/// Allocates scratch locations scoped to the current run.
///
/// Returned handles delete their location when dropped, so a syncer that
/// fails halfway never leaves scratch data behind.
pub trait TempArea {
    /// Allocate a uniquely named empty directory.
    fn temp_dir(&self, name: &str) -> Result<TempDir>;

    /// Allocate a uniquely named empty file whose name starts with `pattern`.
    fn temp_file(&self, pattern: &str) -> Result<NamedTempFile>;
}

/// Working tree used to assemble a directory before atomically replacing it.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    staging: PathBuf,
    incoming: PathBuf,
    /// Locked owner file, held from the first prepare until clean up
    owner: RefCell<Option<File>>,
}

impl StagingArea {
    /// Create a staging area with a unique root inside `base`.
    ///
    /// `base` should be on the same filesystem as the directories being
    /// replaced, since [`StagingArea::replace`] renames.
    pub fn new(base: &Path) -> Self {
        let name = format!("{}-{}", ROOT_PREFIX, Uuid::new_v4().simple());
        Self::with_root(base.join(name))
    }

    /// Create a staging area at an explicit root.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            staging: root.join(STAGING_DIR),
            incoming: root.join(INCOMING_DIR),
            root,
            owner: RefCell::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn incoming_dir(&self) -> &Path {
        &self.incoming
    }

    /// Recreate both subtrees empty, owner-only.
    ///
    /// The first call also claims the root and removes sibling roots whose
    /// owning run is gone.
    pub fn prepare(&self) -> Result<()> {
        if self.owner.borrow().is_none() {
            create_private_dir(&self.root)?;
            let owner = lock_owner(&self.root)?;
            *self.owner.borrow_mut() = Some(owner);
            self.remove_abandoned_roots()?;
        }

        io::remove_path(&self.staging)?;
        io::remove_path(&self.incoming)?;
        create_private_dir(&self.staging)?;
        create_private_dir(&self.incoming)?;
        tracing::debug!(root = %self.root.display(), "prepared staging area");
        Ok(())
    }

    /// Resolve a content destination inside `staging`, creating its parents.
    ///
    /// The entire-directory path `.` resolves to the staging directory itself.
    /// The returned path itself is not created.
    pub fn new_child(&self, relative: &NormalizedPath) -> Result<PathBuf> {
        if relative.is_dot() {
            return Ok(self.staging.clone());
        }
        if relative.is_absolute() || relative.escapes_base() {
            return Err(Error::internal(format!(
                "content path '{relative}' escapes the staging directory"
            )));
        }

        let child = self.staging.join(relative.to_native());
        if let Some(parent) = child.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
        }
        Ok(child)
    }

    /// Swap the assembled `staging` tree into `final_path`.
    ///
    /// Removes whatever is at `final_path`, ensures its parent exists, then
    /// renames. After this returns, `staging` no longer exists until the next
    /// [`StagingArea::prepare`].
    pub fn replace(&self, final_path: &Path) -> Result<()> {
        if !self.staging.is_dir() {
            return Err(Error::internal(format!(
                "staging directory {} is missing; prepare() was not called",
                self.staging.display()
            )));
        }

        io::remove_path(final_path)?;
        if let Some(parent) = final_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
        }

        fs::rename(&self.staging, final_path)
            .map_err(|e| Error::io("move staging directory into", final_path, e))?;
        tracing::debug!(path = %final_path.display(), "replaced directory");
        Ok(())
    }

    /// Release the root and remove it.
    pub fn clean_up(&self) -> Result<()> {
        // Closing the owner file releases its lock
        self.owner.borrow_mut().take();
        io::remove_path(&self.root)
    }

    fn remove_abandoned_roots(&self) -> Result<()> {
        let Some(base) = self.root.parent() else {
            return Ok(());
        };
        let prefix = format!("{ROOT_PREFIX}-");

        let entries = fs::read_dir(base).map_err(|e| Error::io("read directory", base, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("read directory", base, e))?;
            let path = entry.path();
            let is_root = entry.file_type().is_ok_and(|t| t.is_dir())
                && entry.file_name().to_string_lossy().starts_with(&prefix);
            if !is_root || path == self.root || owner_is_live(&path)? {
                continue;
            }

            tracing::info!(root = %path.display(), "removing abandoned staging area");
            // Another run may be sweeping the same root
            if let Err(e) = io::remove_path(&path) {
                tracing::warn!(
                    root = %path.display(),
                    error = %e,
                    "failed to remove abandoned staging area"
                );
            }
        }
        Ok(())
    }
}

fn lock_owner(root: &Path) -> Result<File> {
    let path = root.join(OWNER_FILE);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| Error::io("create", &path, e))?;
    file.try_lock_exclusive()
        .map_err(|_| Error::LockFailed { path })?;
    Ok(file)
}

/// A root without an owner file, or whose owner file can be locked, has
/// no running owner.
fn owner_is_live(root: &Path) -> Result<bool> {
    let path = root.join(OWNER_FILE);
    let file = match OpenOptions::new().write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io("open", &path, e)),
    };
    Ok(file.try_lock_exclusive().is_err())
}

impl TempArea for StagingArea {
    fn temp_dir(&self, name: &str) -> Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("{name}-"))
            .tempdir_in(&self.incoming)
            .map_err(|e| Error::io("create temp directory in", &self.incoming, e))
    }

    fn temp_file(&self, pattern: &str) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(pattern)
            .tempfile_in(&self.incoming)
            .map_err(|e| Error::io("create temp file in", &self.incoming, e))
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = self.clean_up() {
            tracing::warn!(root = %self.root.display(), error = %e, "failed to clean up staging area");
        }
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|e| Error::io("create directory", path, e))
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io("create directory", path, e))
}
