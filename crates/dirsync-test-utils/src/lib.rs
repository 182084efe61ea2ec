//! Shared test utilities for the dirsync workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: git repositories with real history, built through `git2`
//! - [`workspace`]: [`TestWorkspace`](workspace::TestWorkspace) for
//!   config-driven sync scenarios

pub mod git;
pub mod workspace;
