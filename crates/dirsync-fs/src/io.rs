//! Atomic I/O operations and tree helpers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
    }

    // Same directory as the target so the rename stays on one filesystem
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io("create", &temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io("write", &temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::io("flush", &temp_path, e))?;
    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io("rename into", path, e))?;

    Ok(())
}

/// Write `content` only when it differs from what is already at `path`.
///
/// Returns whether the file was written. An unchanged file keeps its bytes
/// and its modification time.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content => {
            tracing::debug!(path = %path.display(), "content unchanged, skipping write");
            Ok(false)
        }
        Ok(_) => write_atomic(path, content).map(|()| true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_atomic(path, content).map(|()| true)
        }
        Err(e) => Err(Error::io("read", path, e)),
    }
}

/// Remove a file, symlink or directory tree if it exists.
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io("inspect", path, e)),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io("remove directory", path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::io("remove file", path, e))
    }
}

/// Move directory `src` to `dst`, replacing whatever is at `dst`.
///
/// Both paths must live on the same filesystem.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_path(dst)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
    }
    fs::rename(src, dst).map_err(|e| Error::io("rename into", dst, e))
}

/// Recursively copy `src` into `dst`, creating `dst` when missing.
///
/// Symlinks are recreated as links (their targets are not followed), and
/// entries for which `skip` returns true, relative to `src`, are left out
/// together with their subtrees.
pub fn copy_tree_filtered(src: &Path, dst: &Path, skip: impl Fn(&Path) -> bool) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::io("create directory", dst, e))?;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(src)
                .map(|rel| !skip(rel))
                .unwrap_or(true)
        });

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::internal(format!("walked outside of {}", src.display())))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io("create directory", &target, e))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())
                .map_err(|e| Error::io("read link", entry.path(), e))?;
            symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::io("copy into", &target, e))?;
        }
    }

    Ok(())
}

/// Recursively copy `src` into `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    copy_tree_filtered(src, dst, |_| false)
}

#[cfg(unix)]
fn symlink(link: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, target).map_err(|e| Error::io("create symlink", target, e))
}

#[cfg(windows)]
fn symlink(link: &Path, target: &Path) -> Result<()> {
    let resolved = target.parent().map(|p| p.join(link)).unwrap_or_else(|| link.to_path_buf());
    let result = if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(link, target)
    } else {
        std::os::windows::fs::symlink_file(link, target)
    };
    result.map_err(|e| Error::io("create symlink", target, e))
}

pub(crate) fn walk_error(root: &Path, error: walkdir::Error) -> Error {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    match error.into_io_error() {
        Some(source) => Error::io("walk", path, source),
        None => Error::internal(format!("filesystem loop detected at {}", path.display())),
    }
}

/// Apply unix mode bits to `path`. A no-op on other platforms.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io("set permissions on", path, e))
}

/// Apply unix mode bits to `path`. A no-op on other platforms.
#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
