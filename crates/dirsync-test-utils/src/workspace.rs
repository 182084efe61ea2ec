//! [`TestWorkspace`] builder for sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Default config file name looked up by the engine and the CLI.
pub const CONFIG_FILE: &str = "dirsync.yml";

/// Default lock file name written next to the config.
pub const LOCK_FILE: &str = "dirsync.lock.yml";

/// A temporary working directory with helpers for writing configs and
/// asserting on synced trees.
///
/// # Example
///
/// ```rust,no_run
/// use dirsync_test_utils::workspace::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// ws.write_file("local/X", "x");
/// ws.write_config("apiVersion: dirsync.dev/v1alpha1\nkind: Config\ndirectories: []\n");
/// ws.assert_file_exists("dirsync.yml");
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new()
                .unwrap_or_else(|e| panic!("TestWorkspace::new: failed to create temp dir: {e}")),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` inside the workspace.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("write_file: failed to create {}: {e}", parent.display())
            });
        }
        fs::write(&path, contents)
            .unwrap_or_else(|e| panic!("write_file: failed to write {}: {e}", path.display()));
    }

    /// Write [`CONFIG_FILE`] at the workspace root.
    pub fn write_config(&self, yaml: &str) {
        self.write_file(CONFIG_FILE, yaml);
    }

    /// Read a file as text.
    pub fn read_file(&self, relative: &str) -> String {
        let path = self.path(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("read_file: failed to read {}: {e}", path.display()))
    }

    /// Read [`LOCK_FILE`] as text.
    pub fn read_lock(&self) -> String {
        self.read_file(LOCK_FILE)
    }

    /// Sorted relative paths of every file (not directory) under `relative`.
    pub fn list_files(&self, relative: &str) -> Vec<String> {
        let root = self.path(relative);
        let mut files = Vec::new();
        collect_files(&root, &root, &mut files);
        files.sort();
        files
    }

    pub fn assert_file_exists(&self, relative: &str) {
        assert!(
            self.path(relative).exists(),
            "expected {relative} to exist in {}",
            self.root().display()
        );
    }

    pub fn assert_file_missing(&self, relative: &str) {
        assert!(
            !self.path(relative).exists(),
            "expected {relative} to be absent from {}",
            self.root().display()
        );
    }

    pub fn assert_file_contents(&self, relative: &str, expected: &str) {
        assert_eq!(self.read_file(relative), expected, "contents of {relative}");
    }

    /// Names of leftover staging roots at the workspace root.
    pub fn staging_leftovers(&self) -> Vec<String> {
        fs::read_dir(self.root())
            .unwrap_or_else(|e| panic!("staging_leftovers: failed to read root: {e}"))
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".dirsync-tmp"))
            .collect()
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            collect_files(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}
