//! Lock reconciliation and persistence

use dirsync_core::lock::{GitLock, LockDirectory, ManualLock};
use dirsync_core::{LockConfig, LockContent, LockSource};
use dirsync_fs::NormalizedPath;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn manual(path: &str) -> LockContent {
    LockContent::new(path, LockSource::Manual(ManualLock {}))
}

fn sample() -> LockConfig {
    let mut lock = LockConfig::new();
    lock.directories.push(LockDirectory {
        path: NormalizedPath::new("vendor"),
        contents: vec![
            manual("a"),
            LockContent::new(
                "repo",
                LockSource::Git(GitLock {
                    sha: "0123abcd".to_string(),
                    commit_title: "Release".to_string(),
                    tags: vec!["v1".to_string()],
                }),
            ),
        ],
    });
    lock
}

#[test]
fn write_to_file_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirsync.lock.yml");
    let lock = sample();

    assert!(lock.write_to_file(&path).unwrap());
    let bytes = std::fs::read(&path).unwrap();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

    assert!(!lock.write_to_file(&path).unwrap());

    assert_eq!(std::fs::read(&path).unwrap(), bytes);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn write_to_file_rewrites_changed_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirsync.lock.yml");
    sample().write_to_file(&path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut changed = sample();
    changed.append_contents(&NormalizedPath::new("vendor"), manual("b"));

    assert!(changed.write_to_file(&path).unwrap());
    let after = std::fs::read_to_string(&path).unwrap();
    assert_ne!(before, after);
    assert_eq!(LockConfig::load(&path).unwrap(), changed);
}

#[test]
fn replace_and_append_leave_lock_untouched_on_miss() {
    let mut lock = sample();
    let original = lock.clone();

    assert!(!lock.replace_contents(&NormalizedPath::new("other/a"), manual("a")));
    assert!(!lock.replace_contents(&NormalizedPath::new("vendor/missing"), manual("missing")));
    assert!(!lock.append_contents(&NormalizedPath::new("other"), manual("a")));

    assert_eq!(lock, original);
}

#[test]
fn append_keeps_declaration_order() {
    let mut lock = sample();
    assert!(lock.append_contents(&NormalizedPath::new("vendor"), manual("z")));

    let paths: Vec<&str> = lock.directories[0]
        .contents
        .iter()
        .map(|c| c.path.as_str())
        .collect();
    assert_eq!(paths, vec!["a", "repo", "z"]);
}

#[test]
fn merge_concatenates_without_deduplication() {
    let mut lock = sample();
    lock.merge(sample());

    assert_eq!(lock.directories.len(), 2);
    assert_eq!(lock.directories[0], lock.directories[1]);
}

#[test]
fn load_if_exists_returns_none_for_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(
        LockConfig::load_if_exists(&dir.path().join("absent.yml"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn load_reports_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirsync.lock.yml");
    std::fs::write(&path, "apiVersion: [unclosed\n").unwrap();

    let err = LockConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("dirsync.lock.yml"), "{err}");
}
