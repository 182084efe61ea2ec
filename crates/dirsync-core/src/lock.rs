//! Lock record: the resolved identifier of every synced content
//!
//! A [`LockConfig`] mirrors the directory/content shape of the config it was
//! produced from, in the same order, but each content only carries what is
//! needed to reproduce the sync (commit, digest, resolved version). It never
//! holds credentials.

use std::path::Path;

use dirsync_fs::{NormalizedPath, io};
use serde::{Deserialize, Serialize};

use crate::config::{API_VERSION, LOCK_KIND, SourceKind, check_header};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub directories: Vec<LockDirectory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDirectory {
    pub path: NormalizedPath,
    #[serde(default)]
    pub contents: Vec<LockContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLockContent", into = "RawLockContent")]
pub struct LockContent {
    pub path: NormalizedPath,
    /// Digest of the declared content, kept only for lazy contents
    pub config_digest: Option<String>,
    pub source: LockSource,
}

impl LockContent {
    pub fn new(path: impl Into<NormalizedPath>, source: LockSource) -> Self {
        Self {
            path: path.into(),
            config_digest: None,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLock {
    pub sha: String,
    #[serde(default)]
    pub commit_title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpLock {
    pub url: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLock {
    /// Digest-qualified reference
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImgpkgBundleLock {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartLock {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubReleaseLock {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineLock {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryLock {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualLock {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLock {
    pub release: String,
}

/// Resolved identifier of one content's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockSource {
    Git(GitLock),
    Http(HttpLock),
    Image(ImageLock),
    ImgpkgBundle(ImgpkgBundleLock),
    HelmChart(HelmChartLock),
    GithubRelease(GithubReleaseLock),
    Inline(InlineLock),
    Directory(DirectoryLock),
    Manual(ManualLock),
    Catalog(CatalogLock),
}

impl LockSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Git(_) => SourceKind::Git,
            Self::Http(_) => SourceKind::Http,
            Self::Image(_) => SourceKind::Image,
            Self::ImgpkgBundle(_) => SourceKind::ImgpkgBundle,
            Self::HelmChart(_) => SourceKind::HelmChart,
            Self::GithubRelease(_) => SourceKind::GithubRelease,
            Self::Inline(_) => SourceKind::Inline,
            Self::Directory(_) => SourceKind::Directory,
            Self::Manual(_) => SourceKind::Manual,
            Self::Catalog(_) => SourceKind::Catalog,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLockContent {
    path: NormalizedPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http: Option<HttpLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<ImageLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imgpkg_bundle: Option<ImgpkgBundleLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    helm_chart: Option<HelmChartLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    github_release: Option<GithubReleaseLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline: Option<InlineLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<DirectoryLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manual: Option<ManualLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catalog: Option<CatalogLock>,
}

impl TryFrom<RawLockContent> for LockContent {
    type Error = Error;

    fn try_from(raw: RawLockContent) -> Result<Self> {
        let mut found = Vec::new();
        if let Some(l) = raw.git {
            found.push(LockSource::Git(l));
        }
        if let Some(l) = raw.http {
            found.push(LockSource::Http(l));
        }
        if let Some(l) = raw.image {
            found.push(LockSource::Image(l));
        }
        if let Some(l) = raw.imgpkg_bundle {
            found.push(LockSource::ImgpkgBundle(l));
        }
        if let Some(l) = raw.helm_chart {
            found.push(LockSource::HelmChart(l));
        }
        if let Some(l) = raw.github_release {
            found.push(LockSource::GithubRelease(l));
        }
        if let Some(l) = raw.inline {
            found.push(LockSource::Inline(l));
        }
        if let Some(l) = raw.directory {
            found.push(LockSource::Directory(l));
        }
        if let Some(l) = raw.manual {
            found.push(LockSource::Manual(l));
        }
        if let Some(l) = raw.catalog {
            found.push(LockSource::Catalog(l));
        }

        let source = match (found.pop(), found.is_empty()) {
            (Some(source), true) => source,
            _ => {
                return Err(Error::config(format!(
                    "Expected exactly one lock source for content '{}'",
                    raw.path
                )));
            }
        };
        Ok(Self {
            path: raw.path,
            config_digest: raw.config_digest,
            source,
        })
    }
}

impl From<LockContent> for RawLockContent {
    fn from(content: LockContent) -> Self {
        let mut raw = Self {
            path: content.path,
            config_digest: content.config_digest,
            git: None,
            http: None,
            image: None,
            imgpkg_bundle: None,
            helm_chart: None,
            github_release: None,
            inline: None,
            directory: None,
            manual: None,
            catalog: None,
        };
        match content.source {
            LockSource::Git(l) => raw.git = Some(l),
            LockSource::Http(l) => raw.http = Some(l),
            LockSource::Image(l) => raw.image = Some(l),
            LockSource::ImgpkgBundle(l) => raw.imgpkg_bundle = Some(l),
            LockSource::HelmChart(l) => raw.helm_chart = Some(l),
            LockSource::GithubRelease(l) => raw.github_release = Some(l),
            LockSource::Inline(l) => raw.inline = Some(l),
            LockSource::Directory(l) => raw.directory = Some(l),
            LockSource::Manual(l) => raw.manual = Some(l),
            LockSource::Catalog(l) => raw.catalog = Some(l),
        }
        raw
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LockConfig {
    /// An empty lock with the current version tag.
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: LOCK_KIND.to_string(),
            directories: Vec::new(),
        }
    }

    /// Parse and check a lock document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let lock: Self = serde_yaml::from_str(text)?;
        check_header(&lock.api_version, &lock.kind, LOCK_KIND)?;
        Ok(lock)
    }

    /// Load the lock file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|e| match e {
            Error::Yaml(source) => Error::Parse {
                origin: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Load the lock file at `path`, or `None` when there is none.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Entry for the content at `content` inside directory `directory`.
    pub fn find_content(
        &self,
        directory: &NormalizedPath,
        content: &NormalizedPath,
    ) -> Option<&LockContent> {
        self.directories
            .iter()
            .filter(|d| &d.path == directory)
            .flat_map(|d| d.contents.iter())
            .find(|c| &c.path == content)
    }

    /// Overwrite the entry whose full destination (directory joined with
    /// content path) equals `full_path`.
    ///
    /// Returns false, leaving the lock untouched, when no entry matches.
    pub fn replace_contents(&mut self, full_path: &NormalizedPath, content: LockContent) -> bool {
        for directory in &mut self.directories {
            if !full_path.is_within(&directory.path) {
                continue;
            }
            let dir_path = &directory.path;
            if let Some(slot) = directory
                .contents
                .iter_mut()
                .find(|c| &dir_path.join(c.path.as_str()) == full_path)
            {
                *slot = content;
                return true;
            }
        }
        false
    }

    /// Append `content` to the directory at `directory`.
    ///
    /// Returns false, leaving the lock untouched, when the directory is absent.
    pub fn append_contents(&mut self, directory: &NormalizedPath, content: LockContent) -> bool {
        match self.directories.iter_mut().find(|d| &d.path == directory) {
            Some(dir) => {
                dir.contents.push(content);
                true
            }
            None => false,
        }
    }

    /// Append every directory of `other`, without deduplication.
    pub fn merge(&mut self, other: LockConfig) {
        self.directories.extend(other.directories);
    }

    /// Serialize deterministically.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the lock to `path` unless the file already holds the same bytes.
    ///
    /// Returns whether the file was written.
    pub fn write_to_file(&self, path: &Path) -> Result<bool> {
        let text = self.to_yaml()?;
        let written = io::write_if_changed(path, text.as_bytes())?;
        tracing::debug!(path = %path.display(), written, "persisted lock");
        Ok(written)
    }
}
