//! Directory synchronization
//!
//! [`SyncEngine::sync`] validates a config, fetches every content into a
//! per-run staging area and swaps each directory into place, then writes
//! the lock record when it changed.

mod engine;

pub use engine::{DirectoryOverride, SyncEngine, SyncOptions, SyncReport};
