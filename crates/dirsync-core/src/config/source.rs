//! Content source descriptors
//!
//! On disk a content names its source by key (`git: {...}`, `manual: {}`).
//! In memory the source is a closed [`Source`] enum; the raw form with one
//! optional field per key only exists to enforce that exactly one key is set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lock::LockSource;
use crate::{Error, Result};

/// Discriminant of [`Source`] and [`LockSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Git,
    Http,
    Image,
    ImgpkgBundle,
    HelmChart,
    GithubRelease,
    Inline,
    Directory,
    Manual,
    Catalog,
}

impl SourceKind {
    /// The document key naming this kind.
    pub fn label(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Http => "http",
            Self::Image => "image",
            Self::ImgpkgBundle => "imgpkgBundle",
            Self::HelmChart => "helmChart",
            Self::GithubRelease => "githubRelease",
            Self::Inline => "inline",
            Self::Directory => "directory",
            Self::Manual => "manual",
            Self::Catalog => "catalog",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference to a Secret document by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    /// Branch, tag, `origin/<branch>` or commit
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_unpack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImgpkgBundleSource {
    pub image: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recursive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<HelmRepository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepository {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubReleaseSource {
    /// `owner/repo`
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub latest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asset_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

/// Literal files, optionally completed from Secret/ConfigMap documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSource {
    /// Relative file path to file text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_from: Vec<InlineSourceRef>,
}

/// One `pathsFrom` entry; exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<InlineRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<InlineRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineRef {
    pub name: String,
    /// Directory under the content root receiving the record's keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
}

/// Copy of a local directory, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySource {
    pub path: String,
}

/// Leaves the content as it currently is on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualSource {}

/// Files from a product-file catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSource {
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Where a content's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Git(GitSource),
    Http(HttpSource),
    Image(ImageSource),
    ImgpkgBundle(ImgpkgBundleSource),
    HelmChart(HelmChartSource),
    GithubRelease(GithubReleaseSource),
    Inline(InlineSource),
    Directory(DirectorySource),
    Manual(ManualSource),
    Catalog(CatalogSource),
}

impl Source {
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

    /// Pin this source to the resolved identifier recorded in a lock entry.
    ///
    /// `path` names the content in the error raised when the lock entry is
    /// of a different kind.
    pub fn apply_lock(&mut self, path: &str, lock: &LockSource) -> Result<()> {
        match (self, lock) {
            (Self::Git(src), LockSource::Git(lock)) => src.reference = Some(lock.sha.clone()),
            (Self::Http(src), LockSource::Http(lock)) => {
                src.url = lock.url.clone();
                src.sha256 = Some(lock.sha256.clone());
            }
            (Self::Image(src), LockSource::Image(lock)) => src.url = lock.url.clone(),
            (Self::ImgpkgBundle(src), LockSource::ImgpkgBundle(lock)) => {
                src.image = lock.image.clone()
            }
            (Self::HelmChart(src), LockSource::HelmChart(lock)) => {
                src.version = Some(lock.version.clone())
            }
            (Self::GithubRelease(src), LockSource::GithubRelease(lock)) => {
                src.url = Some(lock.url.clone())
            }
            (Self::Catalog(src), LockSource::Catalog(lock)) => {
                src.release = Some(lock.release.clone())
            }
            (Self::Inline(_), LockSource::Inline(_))
            | (Self::Directory(_), LockSource::Directory(_))
            | (Self::Manual(_), LockSource::Manual(_)) => {}
            (src, lock) => {
                return Err(Error::LockKindMismatch {
                    path: path.to_string(),
                    expected: src.kind().label(),
                    found: lock.kind().label(),
                });
            }
        }
        Ok(())
    }
}

/// Document form of [`Source`]: one optional field per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http: Option<HttpSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imgpkg_bundle: Option<ImgpkgBundleSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    helm_chart: Option<HelmChartSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    github_release: Option<GithubReleaseSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline: Option<InlineSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<DirectorySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manual: Option<ManualSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catalog: Option<CatalogSource>,
}

impl RawSource {
    /// Collapse to a [`Source`], failing unless exactly one key is set.
    pub(crate) fn into_source(self, content_path: &str) -> Result<Source> {
        let mut found = Vec::new();
        if let Some(s) = self.git {
            found.push(Source::Git(s));
        }
        if let Some(s) = self.http {
            found.push(Source::Http(s));
        }
        if let Some(s) = self.image {
            found.push(Source::Image(s));
        }
        if let Some(s) = self.imgpkg_bundle {
            found.push(Source::ImgpkgBundle(s));
        }
        if let Some(s) = self.helm_chart {
            found.push(Source::HelmChart(s));
        }
        if let Some(s) = self.github_release {
            found.push(Source::GithubRelease(s));
        }
        if let Some(s) = self.inline {
            found.push(Source::Inline(s));
        }
        if let Some(s) = self.directory {
            found.push(Source::Directory(s));
        }
        if let Some(s) = self.manual {
            found.push(Source::Manual(s));
        }
        if let Some(s) = self.catalog {
            found.push(Source::Catalog(s));
        }

        if found.len() != 1 {
            let names: Vec<&str> = found.iter().map(|s| s.kind().label()).collect();
            return Err(Error::config(format!(
                "Expected exactly one content source for content '{content_path}', found {} [{}]",
                found.len(),
                names.join(", ")
            )));
        }
        found
            .pop()
            .ok_or_else(|| Error::internal("source list emptied after length check"))
    }
}

impl From<Source> for RawSource {
    fn from(source: Source) -> Self {
        let mut raw = Self::default();
        match source {
            Source::Git(s) => raw.git = Some(s),
            Source::Http(s) => raw.http = Some(s),
            Source::Image(s) => raw.image = Some(s),
            Source::ImgpkgBundle(s) => raw.imgpkg_bundle = Some(s),
            Source::HelmChart(s) => raw.helm_chart = Some(s),
            Source::GithubRelease(s) => raw.github_release = Some(s),
            Source::Inline(s) => raw.inline = Some(s),
            Source::Directory(s) => raw.directory = Some(s),
            Source::Manual(s) => raw.manual = Some(s),
            Source::Catalog(s) => raw.catalog = Some(s),
        }
        raw
    }
}
