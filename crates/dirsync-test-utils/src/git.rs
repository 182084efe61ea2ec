//! Git repository fixtures built with `git2`, no `git` binary required.

use std::fs;
use std::path::Path;

use git2::{IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature};

/// Initialise a repository whose initial branch is `main`, without commits.
///
/// # Panics
/// Panics if the repository cannot be created.
pub fn init_repo(path: &Path) -> Repository {
    let mut options = RepositoryInitOptions::new();
    options.initial_head("main");
    Repository::init_opts(path, &options).unwrap_or_else(|e| {
        panic!(
            "init_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

/// Write `contents` to `relative` inside the work tree and commit every
/// pending change on the current branch.
///
/// Returns the new commit id.
///
/// # Panics
/// Panics if any filesystem or git operation fails.
pub fn commit_file(repo: &Repository, relative: &str, contents: &str, message: &str) -> Oid {
    let workdir = repo
        .workdir()
        .unwrap_or_else(|| panic!("commit_file: repository has no work tree"));
    let path = workdir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("commit_file: failed to create {}: {e}", parent.display()));
    }
    fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("commit_file: failed to write {}: {e}", path.display()));

    commit_all(repo, message)
}

/// Commit everything in the work tree, staging additions and removals.
///
/// # Panics
/// Panics if any git operation fails.
pub fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo
        .index()
        .unwrap_or_else(|e| panic!("commit_all: failed to open index: {e}"));
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .unwrap_or_else(|e| panic!("commit_all: failed to stage files: {e}"));
    index
        .update_all(["*"], None)
        .unwrap_or_else(|e| panic!("commit_all: failed to stage removals: {e}"));
    index
        .write()
        .unwrap_or_else(|e| panic!("commit_all: failed to write index: {e}"));
    let tree_id = index
        .write_tree()
        .unwrap_or_else(|e| panic!("commit_all: failed to write tree: {e}"));
    let tree = repo
        .find_tree(tree_id)
        .unwrap_or_else(|e| panic!("commit_all: failed to find tree: {e}"));

    let signature = Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("commit_all: failed to build signature: {e}"));
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )
    .unwrap_or_else(|e| panic!("commit_all: failed to commit: {e}"))
}

/// Create a lightweight tag `name` on commit `target`.
///
/// # Panics
/// Panics if the tag cannot be created.
pub fn tag(repo: &Repository, name: &str, target: Oid) {
    let object = repo
        .find_object(target, None)
        .unwrap_or_else(|e| panic!("tag: failed to find {target}: {e}"));
    repo.tag_lightweight(name, &object, false)
        .unwrap_or_else(|e| panic!("tag: failed to create tag {name}: {e}"));
}

/// Create branch `name` at commit `target` without switching to it.
///
/// # Panics
/// Panics if the branch cannot be created.
pub fn branch(repo: &Repository, name: &str, target: Oid) {
    let commit = repo
        .find_commit(target)
        .unwrap_or_else(|e| panic!("branch: failed to find {target}: {e}"));
    repo.branch(name, &commit, false)
        .unwrap_or_else(|e| panic!("branch: failed to create branch {name}: {e}"));
}

/// A repository at `path` on `main` with `README.md` and `src/lib.rs`
/// committed, tagged `v1.0.0`.
///
/// # Panics
/// Panics if any git operation fails.
pub fn seeded_repo(path: &Path) -> (Repository, Oid) {
    let repo = init_repo(path);
    commit_file(&repo, "README.md", "# Upstream\n", "Add readme");
    let head = commit_file(&repo, "src/lib.rs", "pub fn upstream() {}\n", "Add library");
    tag(&repo, "v1.0.0", head);
    (repo, head)
}
