//! Version-control abstraction over the Publication Record.
//!
//! The [`Vcs`] trait keeps commit and push as separate operations so the
//! publisher can be driven by a recording fake in tests.

use std::env;
use std::fmt;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::types::{Identity, PushTarget};
use crate::io::git::Git;

/// Push token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Resolve the push credential named by `token_env`.
///
/// An empty `token_env` means ambient git credentials (`Ok(None)`); a named but
/// unset or empty variable is an error.
pub fn resolve_credential(token_env: &str) -> Result<Option<Credential>> {
    if token_env.trim().is_empty() {
        return Ok(None);
    }
    match env::var(token_env) {
        Ok(token) if !token.trim().is_empty() => Ok(Some(Credential::new(token.trim()))),
        _ => Err(anyhow!(
            "push requires a token in ${token_env}, but it is not set"
        )),
    }
}

/// Operations the publisher needs from the Publication Record.
pub trait Vcs {
    /// Bytes of `path` in the last commit, `None` if never published.
    fn read_published(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Commit exactly `path` as `identity`; returns the commit id.
    fn commit_artifact(&self, path: &Path, identity: &Identity, message: &str) -> Result<String>;

    /// Push the current commit to `target`.
    fn push(&self, target: &PushTarget, credential: Option<&Credential>) -> Result<()>;

    /// Id of a publication commit by `identity` that `target` has not
    /// received, e.g. after a failed push.
    fn unpushed_publication(
        &self,
        target: &PushTarget,
        identity: &Identity,
    ) -> Result<Option<String>>;
}

impl Vcs for Git {
    fn read_published(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        self.read_committed(path)
    }

    fn commit_artifact(&self, path: &Path, identity: &Identity, message: &str) -> Result<String> {
        self.commit_path(path, identity, message)
    }

    fn push(&self, target: &PushTarget, credential: Option<&Credential>) -> Result<()> {
        self.push_head(
            &target.remote,
            &target.branch,
            credential.map(Credential::expose),
        )
    }

    fn unpushed_publication(
        &self,
        target: &PushTarget,
        identity: &Identity,
    ) -> Result<Option<String>> {
        self.unpushed_head(&target.remote, &target.branch, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_env_uses_ambient_credentials() {
        assert_eq!(resolve_credential("").expect("resolve"), None);
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = resolve_credential("METASYNC_TEST_TOKEN_THAT_IS_NEVER_SET")
            .expect_err("missing token");
        assert!(err.to_string().contains("METASYNC_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn debug_hides_secret() {
        let credential = Credential::new("s3cret");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.expose(), "s3cret");
    }
}
