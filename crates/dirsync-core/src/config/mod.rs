//! Configuration documents
//!
//! - [`Config`]: directories and their contents, each with one [`Source`]
//! - validation of paths, patterns and overlap, run before anything is fetched
//! - [`load_files`]: multi-document loading alongside Secret/ConfigMap records

mod loader;
mod overlap;
mod schema;
mod source;

pub use loader::{LoadedDocuments, load_files, load_str};
pub use overlap::validate_overlap;
pub use schema::{Config, Content, Directory, Permissions};
pub use source::{
    CatalogSource, DirectorySource, GitSource, GithubReleaseSource, HelmChartSource,
    HelmRepository, HttpSource, ImageSource, ImgpkgBundleSource, InlineRef, InlineSource,
    InlineSourceRef, ManualSource, SecretRef, Source, SourceKind,
};

use dirsync_fs::{NormalizedPath, validate_managed_path};

use crate::{Error, Result};

/// Version tag carried by every Config and LockConfig document.
pub const API_VERSION: &str = "dirsync.dev/v1alpha1";

pub const CONFIG_KIND: &str = "Config";

pub const LOCK_KIND: &str = "LockConfig";

/// Config file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "dirsync.yml";

/// Lock file written next to the config by default.
pub const DEFAULT_LOCK_FILE: &str = "dirsync.lock.yml";

/// Check a document's `apiVersion` and `kind` against the expected pair.
pub(crate) fn check_header(api_version: &str, kind: &str, expected_kind: &'static str) -> Result<()> {
    if kind != expected_kind {
        return Err(Error::Kind {
            found: kind.to_string(),
            expected: expected_kind,
        });
    }
    if api_version != API_VERSION {
        return Err(Error::ApiVersion {
            kind: kind.to_string(),
            found: api_version.to_string(),
            expected: API_VERSION,
        });
    }
    Ok(())
}

impl Config {
    /// Check every rule that can be decided without touching the network.
    pub fn validate(&self) -> Result<()> {
        check_header(&self.api_version, &self.kind, CONFIG_KIND)?;

        for directory in &self.directories {
            validate_managed_path(&directory.path)?;

            for content in &directory.contents {
                if !content.is_entire_directory() {
                    validate_managed_path(&content.path)?;
                    validate_relative("content path", &content.path)?;
                }
                if let Some(new_root) = &content.new_root_path {
                    validate_managed_path(new_root)?;
                    validate_relative("newRootPath", new_root)?;
                }
                content.filter()?;
                validate_source(&content.source, &content.path)?;
            }
        }

        validate_overlap(self)
    }

    /// Append the directories of `other`, keeping declaration order.
    pub fn extend(&mut self, other: Config) {
        self.directories.extend(other.directories);
    }
}

fn validate_relative(what: &str, path: &NormalizedPath) -> Result<()> {
    if path.is_absolute() || path.escapes_base() {
        return Err(Error::config(format!(
            "Expected {what} '{path}' to stay within its directory"
        )));
    }
    Ok(())
}

fn validate_source(source: &Source, content_path: &NormalizedPath) -> Result<()> {
    match source {
        Source::Inline(inline) => {
            for entry in &inline.paths_from {
                if entry.secret_ref.is_some() == entry.config_map_ref.is_some() {
                    return Err(Error::config(format!(
                        "Expected exactly one of secretRef or configMapRef in pathsFrom of content '{content_path}'"
                    )));
                }
            }
            Ok(())
        }
        Source::Directory(local) if local.path.trim().is_empty() => Err(Error::config(format!(
            "Expected directory source path of content '{content_path}' to not be empty"
        ))),
        _ => Ok(()),
    }
}
