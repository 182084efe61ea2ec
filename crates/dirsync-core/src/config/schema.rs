//! Config, Directory and Content records

use std::path::PathBuf;

use dirsync_fs::{FileFilter, NormalizedPath};
use serde::{Deserialize, Serialize};

use super::source::{RawSource, Source};
use super::{API_VERSION, CONFIG_KIND};
use crate::{Error, Result};

/// The declarative input: which directories to populate from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub directories: Vec<Directory>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            directories: Vec::new(),
        }
    }
}

/// A managed directory, replaced as a whole on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub path: NormalizedPath,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

impl Directory {
    /// Location on disk, resolved against `base` unless absolute.
    pub fn final_path(&self, base: &std::path::Path) -> PathBuf {
        base.join(self.path.to_native())
    }
}

/// One entry of a directory, populated from a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub struct Content {
    /// Relative to the owning directory; `.` consumes the entire directory
    pub path: NormalizedPath,
    pub source: Source,
    /// Opt into skipping the fetch while this entry is unchanged
    pub lazy: bool,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub legal_paths: Vec<String>,
    /// Subtree promoted to become the content root after filtering
    pub new_root_path: Option<NormalizedPath>,
    pub permissions: Option<Permissions>,
}

impl Content {
    /// A content with no filters, permissions or relocation.
    pub fn new(path: impl Into<NormalizedPath>, source: Source) -> Self {
        Self {
            path: path.into(),
            source,
            lazy: false,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            legal_paths: Vec::new(),
            new_root_path: None,
            permissions: None,
        }
    }

    pub fn is_entire_directory(&self) -> bool {
        self.path.is_dot()
    }

    /// The managed destination: the owning directory joined with this path.
    pub fn full_path(&self, directory: &NormalizedPath) -> NormalizedPath {
        directory.join(self.path.as_str())
    }

    /// The include/exclude/legal rules of this content.
    pub fn filter(&self) -> Result<FileFilter> {
        Ok(FileFilter::new(
            &self.include_paths,
            &self.exclude_paths,
            &self.legal_paths,
        )?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    path: NormalizedPath,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    lazy: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclude_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    legal_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_root_path: Option<NormalizedPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<Permissions>,
    #[serde(flatten)]
    source: RawSource,
}

impl TryFrom<RawContent> for Content {
    type Error = Error;

    fn try_from(raw: RawContent) -> Result<Self> {
        let source = raw.source.into_source(raw.path.as_str())?;
        Ok(Self {
            path: raw.path,
            source,
            lazy: raw.lazy,
            include_paths: raw.include_paths,
            exclude_paths: raw.exclude_paths,
            legal_paths: raw.legal_paths,
            new_root_path: raw.new_root_path,
            permissions: raw.permissions,
        })
    }
}

impl From<Content> for RawContent {
    fn from(content: Content) -> Self {
        Self {
            path: content.path,
            lazy: content.lazy,
            include_paths: content.include_paths,
            exclude_paths: content.exclude_paths,
            legal_paths: content.legal_paths,
            new_root_path: content.new_root_path,
            permissions: content.permissions,
            source: content.source.into(),
        }
    }
}

/// Unix mode bits applied to a synced tree root.
///
/// Written as an octal string (`"0755"`) or a plain integer holding the
/// mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPermissions", into = "RawPermissions")]
pub struct Permissions(u32);

impl Permissions {
    pub fn new(mode: u32) -> Result<Self> {
        if mode > 0o7777 {
            return Err(Error::config(format!(
                "Expected permissions to be at most 07777, got {mode:o}"
            )));
        }
        Ok(Self(mode))
    }

    pub fn mode(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPermissions {
    Mode(u32),
    Octal(String),
}

impl TryFrom<RawPermissions> for Permissions {
    type Error = Error;

    fn try_from(raw: RawPermissions) -> Result<Self> {
        match raw {
            RawPermissions::Mode(mode) => Self::new(mode),
            RawPermissions::Octal(text) => {
                let digits = text.trim().trim_start_matches("0o");
                let mode = u32::from_str_radix(digits, 8).map_err(|_| {
                    Error::config(format!("Expected octal permissions, got '{text}'"))
                })?;
                Self::new(mode)
            }
        }
    }
}

impl From<Permissions> for RawPermissions {
    fn from(permissions: Permissions) -> Self {
        Self::Octal(format!("{:04o}", permissions.0))
    }
}
