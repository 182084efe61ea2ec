//! End-to-end sync runs with fake source syncers

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use dirsync_core::config::{DEFAULT_LOCK_FILE, HttpSource, load_str};
use dirsync_core::lock::HttpLock;
use dirsync_core::{
    DirectoryOverride, Error, LockConfig, LockSource, Result, Source, SourceKind, SourceSyncer,
    SyncEngine, SyncOptions, SyncReport, SyncerRegistry,
};
use dirsync_fs::TempArea;
use dirsync_test_utils::workspace::TestWorkspace;
use pretty_assertions::assert_eq;

const HEADER: &str = "apiVersion: dirsync.dev/v1alpha1\nkind: Config\n";

/// Sources seen by the fake http factory, one per fetch.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<HttpSource>>>);

impl Recorder {
    fn count(&self) -> usize {
        self.0.borrow().len()
    }

    fn last(&self) -> HttpSource {
        self.0.borrow().last().cloned().unwrap()
    }
}

/// Writes a fixed file set, like an unpacked archive.
struct FakeArchive {
    url: String,
    files: &'static [(&'static str, &'static str)],
}

impl SourceSyncer for FakeArchive {
    fn sync(&self, dst: &Path, temp: &dyn TempArea) -> Result<LockSource> {
        // Exercise the scratch area the way a real download would
        let download = temp.temp_file("http-")?;
        fs::write(download.path(), "archive").unwrap();

        fs::create_dir_all(dst).unwrap();
        for (path, text) in self.files {
            let target = dst.join(path);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(target, text).unwrap();
        }
        Ok(LockSource::Http(HttpLock {
            url: self.url.clone(),
            sha256: "f00d".to_string(),
        }))
    }
}

fn archive_registry(
    files: &'static [(&'static str, &'static str)],
    recorder: &Recorder,
) -> SyncerRegistry {
    let recorder = recorder.clone();
    let mut registry = SyncerRegistry::with_builtins();
    registry.register(SourceKind::Http, move |source, _ctx| {
        let Source::Http(http) = source else {
            panic!("expected http source");
        };
        recorder.0.borrow_mut().push(http.clone());
        Ok(Box::new(FakeArchive {
            url: http.url.clone(),
            files,
        }) as Box<dyn SourceSyncer>)
    });
    registry
}

fn run(engine: &SyncEngine, yaml: &str, options: &SyncOptions) -> Result<SyncReport> {
    let loaded = load_str(yaml, "test")?;
    engine.sync(&loaded.config, Path::new(DEFAULT_LOCK_FILE), options)
}

fn lock_of(ws: &TestWorkspace) -> LockConfig {
    LockConfig::load(&ws.path(DEFAULT_LOCK_FILE)).unwrap()
}

const SIMPLE_FILES: &[(&str, &str)] = &[("file.txt", "content")];

fn http_config(dir: &str, content: &str, extra: &str) -> String {
    format!(
        "{HEADER}directories:\n- path: {dir}\n  contents:\n  - path: {content}\n{extra}    http:\n      url: https://example.com/{content}.tgz\n"
    )
}

#[test]
fn manual_entire_directory_is_pass_through() {
    let ws = TestWorkspace::new();
    ws.write_file("vendor/X", "x");
    ws.write_file("vendor/Y", "y");
    let engine = SyncEngine::new(ws.root());

    let yaml = format!("{HEADER}directories:\n- path: vendor\n  contents:\n  - path: .\n    manual: {{}}\n");
    let report = run(&engine, &yaml, &SyncOptions::default()).unwrap();

    assert_eq!(ws.list_files("vendor"), vec!["X".to_string(), "Y".to_string()]);
    assert!(report.lock_updated);
    let lock = lock_of(&ws);
    assert_eq!(lock.directories.len(), 1);
    assert_eq!(lock.directories[0].path.as_str(), "vendor");
    assert_eq!(lock.directories[0].contents.len(), 1);
    assert_eq!(lock.directories[0].contents[0].path.as_str(), ".");
    assert_eq!(lock.directories[0].contents[0].source.kind(), SourceKind::Manual);
    assert!(ws.staging_leftovers().is_empty());
}

#[test]
fn abandoned_staging_root_is_removed_by_next_run() {
    let ws = TestWorkspace::new();
    ws.write_file(".dirsync-tmp-0123456789abcdef/staging/partial.bin", "partial");
    ws.write_file("vendor/X", "x");
    let engine = SyncEngine::new(ws.root());
    let yaml = format!("{HEADER}directories:\n- path: vendor\n  contents:\n  - path: .\n    manual: {{}}\n");

    run(&engine, &yaml, &SyncOptions::default()).unwrap();

    assert!(ws.staging_leftovers().is_empty(), "{:?}", ws.staging_leftovers());
    ws.assert_file_contents("vendor/X", "x");
}

#[test]
fn second_identical_run_leaves_lock_alone() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = http_config("vendor", "lib", "");

    assert!(run(&engine, &yaml, &SyncOptions::default()).unwrap().lock_updated);
    let before = ws.read_lock();
    let report = run(&engine, &yaml, &SyncOptions::default()).unwrap();

    assert!(!report.lock_updated);
    assert_eq!(ws.read_lock(), before);
    assert_eq!(recorder.count(), 2);
}

#[test]
fn overlapping_contents_fail_before_fetch() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = format!(
        "{HEADER}directories:\n- path: vendor\n  contents:\n  - path: a\n    http: {{url: u1}}\n  - path: a/b\n    http: {{url: u2}}\n"
    );

    let err = run(&engine, &yaml, &SyncOptions::default()).unwrap_err();

    assert!(err.to_string().contains("overlapping paths"), "{err}");
    assert_eq!(recorder.count(), 0);
    ws.assert_file_missing("vendor");
    ws.assert_file_missing(DEFAULT_LOCK_FILE);
}

const PACKAGE_FILES: &[(&str, &str)] = &[
    ("pkg/a/keep.txt", "keep"),
    ("pkg/a/b/drop.txt", "drop"),
    ("pkg/a/b/LICENSE", "license"),
    ("pkg/docs/readme.md", "docs"),
    ("LICENSE", "top license"),
];

#[test]
fn filters_apply_before_new_root_promotion() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine =
        SyncEngine::new(ws.root()).with_registry(archive_registry(PACKAGE_FILES, &recorder));
    let extra = "    includePaths: [\"pkg/a/**\"]\n    excludePaths: [pkg/a/b]\n    legalPaths: [pkg/a/b/LICENSE]\n    newRootPath: pkg/a\n";

    run(&engine, &http_config("vendor", "lib", extra), &SyncOptions::default()).unwrap();

    assert_eq!(
        ws.list_files("vendor/lib"),
        vec!["b/LICENSE".to_string(), "keep.txt".to_string()]
    );
}

#[test]
fn missing_new_root_fails() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));

    let err = run(
        &engine,
        &http_config("vendor", "lib", "    newRootPath: nope\n"),
        &SyncOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err.root_cause(), Error::NewRootMissing { .. }), "{err}");
}

#[cfg(unix)]
#[test]
fn permissions_apply_to_content_and_directory() {
    use std::os::unix::fs::PermissionsExt;

    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = format!(
        "{HEADER}directories:\n- path: vendor\n  permissions: \"0755\"\n  contents:\n  - path: lib\n    permissions: \"0750\"\n    http: {{url: u}}\n"
    );

    run(&engine, &yaml, &SyncOptions::default()).unwrap();

    let mode = |p: &str| fs::metadata(ws.path(p)).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode("vendor"), 0o755);
    assert_eq!(mode("vendor/lib"), 0o750);
}

#[test]
fn lazy_content_is_skipped_while_unchanged() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = http_config("vendor", "lib", "    lazy: true\n");

    run(&engine, &yaml, &SyncOptions::default()).unwrap();
    let digest = lock_of(&ws).directories[0].contents[0].config_digest.clone();
    assert!(digest.as_deref().is_some_and(|d| d.starts_with("sha256:")));

    // Local edits survive a skipped fetch
    ws.write_file("vendor/lib/local.txt", "mine");
    let report = run(&engine, &yaml, &SyncOptions::default()).unwrap();

    assert_eq!(recorder.count(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].as_str(), "vendor/lib");
    assert!(!report.lock_updated);
    ws.assert_file_contents("vendor/lib/local.txt", "mine");
    ws.assert_file_contents("vendor/lib/file.txt", "content");
    assert!(ws.staging_leftovers().is_empty());
}

#[test]
fn lazy_disabled_run_fetches_but_keeps_digest() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = http_config("vendor", "lib", "    lazy: true\n");
    run(&engine, &yaml, &SyncOptions::default()).unwrap();

    let options = SyncOptions {
        allow_lazy: false,
        ..SyncOptions::default()
    };
    let report = run(&engine, &yaml, &options).unwrap();

    assert_eq!(recorder.count(), 2);
    assert!(report.skipped.is_empty());
    assert!(lock_of(&ws).directories[0].contents[0].config_digest.is_some());
}

#[test]
fn lazy_content_is_refetched_when_changed_or_missing() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = http_config("vendor", "lib", "    lazy: true\n");
    run(&engine, &yaml, &SyncOptions::default()).unwrap();

    let changed = http_config("vendor", "lib", "    lazy: true\n    excludePaths: [other]\n");
    run(&engine, &changed, &SyncOptions::default()).unwrap();
    assert_eq!(recorder.count(), 2);

    fs::remove_dir_all(ws.path("vendor/lib")).unwrap();
    run(&engine, &changed, &SyncOptions::default()).unwrap();
    assert_eq!(recorder.count(), 3);
    ws.assert_file_exists("vendor/lib/file.txt");
}

#[test]
fn non_lazy_content_never_records_digest() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));

    run(&engine, &http_config("vendor", "lib", ""), &SyncOptions::default()).unwrap();

    assert!(lock_of(&ws).directories[0].contents[0].config_digest.is_none());
    assert!(!ws.read_lock().contains("configDigest"));
}

#[test]
fn locked_mode_requires_lock_file() {
    let ws = TestWorkspace::new();
    let engine = SyncEngine::new(ws.root());
    let options = SyncOptions {
        locked: true,
        ..SyncOptions::default()
    };

    let err = run(&engine, &http_config("vendor", "lib", ""), &options).unwrap_err();

    assert!(matches!(err, Error::LockMissing { .. }));
}

#[test]
fn locked_mode_pins_sources_from_lock() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    let yaml = http_config("vendor", "lib", "");
    run(&engine, &yaml, &SyncOptions::default()).unwrap();
    assert_eq!(recorder.last().sha256, None);

    let options = SyncOptions {
        locked: true,
        ..SyncOptions::default()
    };
    run(&engine, &yaml, &options).unwrap();

    assert_eq!(recorder.last().sha256.as_deref(), Some("f00d"));
}

#[test]
fn locked_mode_rejects_content_missing_from_lock() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    run(&engine, &http_config("vendor", "lib", ""), &SyncOptions::default()).unwrap();

    let options = SyncOptions {
        locked: true,
        ..SyncOptions::default()
    };
    let err = run(&engine, &http_config("vendor", "other", ""), &options).unwrap_err();

    assert!(matches!(err, Error::LockEntryMissing { ref path } if path == "vendor/other"));
    assert_eq!(recorder.count(), 1);
}

fn two_directories() -> String {
    format!(
        "{HEADER}directories:\n- path: one\n  contents:\n  - path: lib\n    http: {{url: u1}}\n- path: two\n  contents:\n  - path: lib\n    http: {{url: u2}}\n"
    )
}

#[test]
fn directory_override_syncs_owning_directory_only() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    run(&engine, &two_directories(), &SyncOptions::default()).unwrap();
    let full_lock = ws.read_lock();

    let options = SyncOptions {
        directory_overrides: vec!["two/lib".parse().unwrap()],
        ..SyncOptions::default()
    };
    let report = run(&engine, &two_directories(), &options).unwrap();

    assert_eq!(recorder.count(), 3);
    assert_eq!(recorder.last().url, "u2");
    assert_eq!(report.directories.len(), 1);
    assert_eq!(report.directories[0].as_str(), "two");
    assert_eq!(ws.read_lock(), full_lock);
}

#[test]
fn directory_override_with_local_dir_replaces_source() {
    let ws = TestWorkspace::new();
    ws.write_file("checkout/hello.txt", "local");
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));
    run(&engine, &two_directories(), &SyncOptions::default()).unwrap();

    let options = SyncOptions {
        directory_overrides: vec![DirectoryOverride {
            path: "two/lib".into(),
            local_dir: Some("checkout".to_string()),
        }],
        ..SyncOptions::default()
    };
    run(&engine, &two_directories(), &options).unwrap();

    assert_eq!(recorder.count(), 2);
    assert_eq!(ws.list_files("two/lib"), vec!["hello.txt".to_string()]);
    let lock = lock_of(&ws);
    assert_eq!(lock.directories.len(), 2);
    assert_eq!(lock.directories[0].contents[0].source.kind(), SourceKind::Http);
    assert_eq!(lock.directories[1].contents[0].source.kind(), SourceKind::Directory);
}

#[test]
fn directory_override_into_fresh_lock_merges_directory() {
    let ws = TestWorkspace::new();
    let recorder = Recorder::default();
    let engine = SyncEngine::new(ws.root()).with_registry(archive_registry(SIMPLE_FILES, &recorder));

    let options = SyncOptions {
        directory_overrides: vec!["two/lib".parse().unwrap()],
        ..SyncOptions::default()
    };
    run(&engine, &two_directories(), &options).unwrap();

    let lock = lock_of(&ws);
    assert_eq!(lock.directories.len(), 1);
    assert_eq!(lock.directories[0].path.as_str(), "two");
    ws.assert_file_missing("one");
}

#[test]
fn unknown_directory_override_fails() {
    let ws = TestWorkspace::new();
    let engine = SyncEngine::new(ws.root());
    let options = SyncOptions {
        directory_overrides: vec!["three/lib".parse().unwrap()],
        ..SyncOptions::default()
    };

    let err = run(&engine, &two_directories(), &options).unwrap_err();

    assert!(matches!(err, Error::OverrideMismatch { matched: 0, .. }));
}

#[test]
fn failure_aborts_run_and_keeps_lock() {
    let ws = TestWorkspace::new();
    let engine = SyncEngine::new(ws.root());
    let yaml = format!(
        "{HEADER}directories:\n- path: first\n  contents:\n  - path: a\n    inline:\n      paths: {{f.txt: one}}\n- path: second\n  contents:\n  - path: b\n    http: {{url: u}}\n- path: third\n  contents:\n  - path: c\n    manual: {{}}\n"
    );

    let err = run(&engine, &yaml, &SyncOptions::default()).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Syncing directory 'second'",
        "outermost context names the directory"
    );
    assert!(matches!(err.root_cause(), Error::UnsupportedSource { kind } if kind == "http"));
    ws.assert_file_contents("first/a/f.txt", "one");
    ws.assert_file_missing("second");
    ws.assert_file_missing("third");
    ws.assert_file_missing(DEFAULT_LOCK_FILE);
    assert!(ws.staging_leftovers().is_empty());
}

#[test]
fn inline_content_resolves_secrets_from_stream() {
    let ws = TestWorkspace::new();
    let yaml = format!(
        "{HEADER}directories:\n- path: config\n  contents:\n  - path: app\n    inline:\n      paths: {{app.yml: 'a: 1'}}\n      pathsFrom:\n      - secretRef: {{name: creds, directoryPath: secrets}}\n---\napiVersion: v1\nkind: Secret\nmetadata: {{name: creds}}\ndata:\n  token: czNjcjN0\n"
    );
    let loaded = load_str(&yaml, "test").unwrap();
    let engine = SyncEngine::new(ws.root()).with_secrets(loaded.secrets);

    engine
        .sync(&loaded.config, Path::new(DEFAULT_LOCK_FILE), &SyncOptions::default())
        .unwrap();

    ws.assert_file_contents("config/app/app.yml", "a: 1");
    ws.assert_file_contents("config/app/secrets/token", "s3cr3t");
    assert!(!ws.read_lock().contains("s3cr3t"));
}

struct EscapingLink {
    target: PathBuf,
}

impl SourceSyncer for EscapingLink {
    fn sync(&self, dst: &Path, _temp: &dyn TempArea) -> Result<LockSource> {
        fs::create_dir_all(dst).unwrap();
        fs::write(dst.join("fine.txt"), "fine").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&self.target, dst.join("escape")).unwrap();
        Ok(LockSource::Http(HttpLock {
            url: "u".to_string(),
            sha256: "f00d".to_string(),
        }))
    }
}

#[cfg(unix)]
#[test]
fn symlink_escape_aborts_without_touching_final_directory() {
    let ws = TestWorkspace::new();
    ws.write_file("vendor/old.txt", "old");
    ws.write_file("secret.txt", "secret");
    let target = ws.path("secret.txt");
    let mut registry = SyncerRegistry::with_builtins();
    registry.register(SourceKind::Http, move |_, _| {
        Ok(Box::new(EscapingLink {
            target: target.clone(),
        }) as Box<dyn SourceSyncer>)
    });
    let engine = SyncEngine::new(ws.root()).with_registry(registry);

    let err = run(&engine, &http_config("vendor", "lib", ""), &SyncOptions::default()).unwrap_err();

    assert!(matches!(
        err.root_cause(),
        Error::Fs(dirsync_fs::Error::SymlinkEscape { .. })
    ));
    assert_eq!(ws.list_files("vendor"), vec!["old.txt".to_string()]);
    ws.assert_file_missing(DEFAULT_LOCK_FILE);
    assert!(ws.staging_leftovers().is_empty());
}

/// Plants `links` (path, target) next to `keep.txt` under `pkg/a`.
struct LinkedPackage {
    links: &'static [(&'static str, &'static str)],
}

impl SourceSyncer for LinkedPackage {
    fn sync(&self, dst: &Path, _temp: &dyn TempArea) -> Result<LockSource> {
        fs::create_dir_all(dst.join("pkg/a")).unwrap();
        fs::write(dst.join("pkg/a/keep.txt"), "keep").unwrap();
        fs::write(dst.join("x"), "inside before relocation").unwrap();
        #[cfg(unix)]
        for (path, target) in self.links {
            std::os::unix::fs::symlink(target, dst.join(path)).unwrap();
        }
        Ok(LockSource::Http(HttpLock {
            url: "u".to_string(),
            sha256: "f00d".to_string(),
        }))
    }
}

fn linked_package_engine(
    ws: &TestWorkspace,
    links: &'static [(&'static str, &'static str)],
) -> SyncEngine {
    let mut registry = SyncerRegistry::with_builtins();
    registry.register(SourceKind::Http, move |_, _| {
        Ok(Box::new(LinkedPackage { links }) as Box<dyn SourceSyncer>)
    });
    SyncEngine::new(ws.root()).with_registry(registry)
}

#[cfg(unix)]
#[test]
fn link_escaping_after_new_root_promotion_is_rejected() {
    let ws = TestWorkspace::new();
    ws.write_file("x", "outside the content root");
    let engine = linked_package_engine(&ws, &[("pkg/a/esc", "../../x")]);

    let err = run(
        &engine,
        &http_config("vendor", "lib", "    newRootPath: pkg/a\n"),
        &SyncOptions::default(),
    )
    .unwrap_err();

    assert!(
        matches!(
            err.root_cause(),
            Error::Fs(
                dirsync_fs::Error::SymlinkEscape { .. }
                    | dirsync_fs::Error::SymlinkUnresolvable { .. }
            )
        ),
        "{err}"
    );
    ws.assert_file_missing("vendor");
    ws.assert_file_missing(DEFAULT_LOCK_FILE);
    assert!(ws.staging_leftovers().is_empty());
}

#[cfg(unix)]
#[test]
fn new_root_naming_a_symlink_is_rejected() {
    let ws = TestWorkspace::new();
    let engine = linked_package_engine(&ws, &[("pkg/alias", "a")]);

    let err = run(
        &engine,
        &http_config("vendor", "lib", "    newRootPath: pkg/alias\n"),
        &SyncOptions::default(),
    )
    .unwrap_err();

    assert!(
        matches!(err.root_cause(), Error::NewRootMissing { path } if path == "pkg/alias"),
        "{err}"
    );
    ws.assert_file_missing("vendor");
}

#[cfg(unix)]
#[test]
fn contained_link_survives_new_root_promotion() {
    let ws = TestWorkspace::new();
    let engine = linked_package_engine(&ws, &[("pkg/a/alias.txt", "keep.txt")]);

    run(
        &engine,
        &http_config("vendor", "lib", "    newRootPath: pkg/a\n"),
        &SyncOptions::default(),
    )
    .unwrap();

    assert_eq!(
        fs::read_to_string(ws.path("vendor/lib/alias.txt")).unwrap(),
        "keep"
    );
}

#[test]
fn syncer_returning_wrong_lock_kind_is_internal() {
    let ws = TestWorkspace::new();
    let mut registry = SyncerRegistry::with_builtins();
    registry.register(SourceKind::Image, |_, _| {
        Ok(Box::new(FakeArchive {
            url: "u".to_string(),
            files: SIMPLE_FILES,
        }) as Box<dyn SourceSyncer>)
    });
    let engine = SyncEngine::new(ws.root()).with_registry(registry);
    let yaml = format!(
        "{HEADER}directories:\n- path: vendor\n  contents:\n  - path: img\n    image: {{url: registry.example.com/app}}\n"
    );

    let err = run(&engine, &yaml, &SyncOptions::default()).unwrap_err();

    assert!(err.is_internal(), "{err}");
}
