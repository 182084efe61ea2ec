//! Clone-and-checkout of a single git revision

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Commit, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository};

use crate::{Error, Result};

/// Give up after this many credential callbacks for one clone; libgit2
/// keeps asking for as long as the remote rejects what it is given.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Credentials offered to the remote during clone.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssh_private_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "ssh_private_key",
                &self.ssh_private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// What to check out.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    /// Remote URL or local repository path
    pub url: &'a str,
    /// Branch, tag, `origin/<branch>` or commit; the remote HEAD when `None`
    pub reference: Option<&'a str>,
    pub credentials: Option<&'a Credentials>,
}

/// The commit a checkout resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub sha: String,
    pub commit_title: String,
    /// Tags pointing at the commit, sorted
    pub tags: Vec<String>,
}

/// Clone `request.url` into `work_dir` and check out the requested revision.
///
/// `work_dir` must be empty or absent. The resulting checkout keeps its
/// `.git` directory; callers copy out what they need.
pub fn checkout(request: &CheckoutRequest<'_>, work_dir: &Path) -> Result<Revision> {
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks(request.credentials));

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);

    tracing::debug!(url = request.url, reference = ?request.reference, "cloning repository");
    let repo = builder
        .clone(request.url, work_dir)
        .map_err(|e| Error::Clone {
            url: request.url.to_string(),
            message: e.message().to_string(),
        })?;

    let commit = resolve(&repo, request)?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(commit.id())?;

    let revision = Revision {
        sha: commit.id().to_string(),
        commit_title: commit.summary().unwrap_or_default().to_string(),
        tags: tags_pointing_at(&repo, &commit)?,
    };
    tracing::info!(url = request.url, sha = %revision.sha, "checked out revision");
    Ok(revision)
}

fn callbacks(credentials: Option<&Credentials>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let Some(credentials) = credentials.cloned() else {
        return callbacks;
    };

    let mut attempts = 0;
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed.contains(CredentialType::SSH_KEY)
            && let Some(key) = &credentials.ssh_private_key
        {
            let user = credentials
                .username
                .as_deref()
                .or(username_from_url)
                .unwrap_or("git");
            return Cred::ssh_key_from_memory(user, None, key, None);
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let (Some(user), Some(password)) = (&credentials.username, &credentials.password)
        {
            return Cred::userpass_plaintext(user, password);
        }

        Err(git2::Error::from_str("no usable credentials configured"))
    });
    callbacks
}

fn resolve<'r>(repo: &'r Repository, request: &CheckoutRequest<'_>) -> Result<Commit<'r>> {
    let Some(reference) = request.reference else {
        return Ok(repo.head()?.peel_to_commit()?);
    };

    // Remote-tracking branches first so `main` means the fetched branch
    let candidates = [format!("origin/{reference}"), reference.to_string()];
    for candidate in &candidates {
        if let Ok(object) = repo.revparse_single(candidate) {
            return Ok(object.peel_to_commit()?);
        }
    }

    Err(Error::RefNotFound {
        reference: reference.to_string(),
        url: request.url.to_string(),
    })
}

fn tags_pointing_at(repo: &Repository, commit: &Commit<'_>) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for name in repo.tag_names(None)?.iter().flatten() {
        let target = repo
            .revparse_single(&format!("refs/tags/{name}"))?
            .peel_to_commit()?;
        if target.id() == commit.id() {
            tags.push(name.to_string());
        }
    }
    tags.sort();
    Ok(tags)
}
