//! Core orchestration layer for dirsync
//!
//! Populates local directories from declared content sources and records
//! what was fetched in a lock file:
//!
//! - **Config model**: directories, contents and their [`Source`]s, loaded
//!   from YAML document streams alongside Secret/ConfigMap records
//! - **Validation**: path, pattern and overlap rules, checked before any fetch
//! - **Lock reconciliation**: [`LockConfig`] building, folding and
//!   idempotent persistence
//! - **Lazy sync**: digest-based skipping of unchanged contents
//! - **Source syncers**: the [`SourceSyncer`] contract and its registry
//! - **SyncEngine**: staging, filtering, symlink checks and atomic replacement
//!
//! # Architecture
//!
//! ```text
//!            dirsync-cli
//!                 |
//!           dirsync-core
//!                 |
//!         +-------+-------+
//!         |               |
//!     dirsync-fs     dirsync-git
//! ```

pub mod config;
pub mod error;
pub mod lazy;
pub mod lock;
pub mod secrets;
pub mod sync;
pub mod syncer;

pub use config::{Config, Content, Directory, LoadedDocuments, Source, SourceKind, load_files};
pub use error::{Error, Result};
pub use lazy::{LazyDecision, config_digest};
pub use lock::{LockConfig, LockContent, LockDirectory, LockSource};
pub use secrets::{ConfigMap, DocumentSecrets, Secret, SecretLookup};
pub use sync::{DirectoryOverride, SyncEngine, SyncOptions, SyncReport};
pub use syncer::{SourceSyncer, SyncContext, SyncerRegistry};
