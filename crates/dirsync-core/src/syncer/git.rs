//! `git`: checkout of a single revision

use std::path::Path;

use dirsync_fs::{TempArea, io};
use dirsync_git::{CheckoutRequest, Credentials, checkout};

use super::{SourceSyncer, SyncContext, misdispatched};
use crate::config::{GitSource, Source, SourceKind};
use crate::lock::{GitLock, LockSource};
use crate::secrets::Secret;
use crate::Result;

/// Keys a git credentials Secret may hold.
const SECRET_KEYS: &[&str] = &["username", "password", "ssh-privatekey"];

#[derive(Debug, Clone)]
pub struct GitSyncer {
    url: String,
    reference: Option<String>,
    credentials: Option<Credentials>,
}

impl GitSyncer {
    pub fn new(source: &GitSource, credentials: Option<Credentials>) -> Self {
        Self {
            url: source.url.clone(),
            reference: source.reference.clone(),
            credentials,
        }
    }
}

fn credentials(secret: &Secret) -> Result<Credentials> {
    secret.expect_keys(SECRET_KEYS)?;
    Ok(Credentials {
        username: secret.text("username")?,
        password: secret.text("password")?,
        ssh_private_key: secret.text("ssh-privatekey")?,
    })
}

pub(super) fn build(source: &Source, ctx: &SyncContext<'_>) -> Result<Box<dyn SourceSyncer>> {
    let Source::Git(git) = source else {
        return Err(misdispatched(SourceKind::Git, source));
    };
    let credentials = match &git.secret_ref {
        Some(secret_ref) => Some(credentials(&ctx.secrets.get_secret(&secret_ref.name)?)?),
        None => None,
    };
    Ok(Box::new(GitSyncer::new(git, credentials)))
}

impl SourceSyncer for GitSyncer {
    fn sync(&self, dst: &Path, temp: &dyn TempArea) -> Result<LockSource> {
        let scratch = temp.temp_dir("git")?;
        let work = scratch.path().join("checkout");

        let request = CheckoutRequest {
            url: &self.url,
            reference: self.reference.as_deref(),
            credentials: self.credentials.as_ref(),
        };
        let revision = checkout(&request, &work)?;

        io::remove_path(&work.join(".git"))?;
        io::move_dir(&work, dst)?;

        Ok(LockSource::Git(GitLock {
            sha: revision.sha,
            commit_title: revision.commit_title,
            tags: revision.tags,
        }))
    }
}
