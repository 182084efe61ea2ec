//! Git checkout primitive for dirsync
//!
//! Clones a repository into a scratch directory, resolves a reference
//! (branch, tag or commit) and checks it out detached, reporting the
//! exact commit so it can be pinned in a lock file.

pub mod checkout;
pub mod error;

pub use checkout::{CheckoutRequest, Credentials, Revision, checkout};
pub use error::{Error, Result};
