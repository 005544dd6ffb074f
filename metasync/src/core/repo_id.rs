//! Repository identity (`owner/name`) parsing and comparison.

use std::fmt;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

/// `owner/name` identity of a hosted repository.
///
/// Equality is ASCII case-insensitive, matching how hosts resolve paths.
#[derive(Debug, Clone, Eq)]
pub struct RepoIdentity {
    owner: String,
    name: String,
}

impl RepoIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `owner/name` slug.
    pub fn parse(slug: &str) -> Result<Self> {
        static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("valid slug regex")
        });
        let trimmed = slug.trim();
        let caps = SLUG_RE
            .captures(trimmed)
            .ok_or_else(|| anyhow!("invalid repository slug '{trimmed}' (expected owner/name)"))?;
        Ok(Self::new(&caps[1], strip_git_suffix(&caps[2])))
    }

    /// Derive the identity from a git remote URL.
    ///
    /// Supports `https://host/owner/name(.git)`, `ssh://user@host/owner/name`
    /// and scp-like `user@host:owner/name(.git)`.
    pub fn from_remote_url(url: &str) -> Option<Self> {
        static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?:[a-z+]+://(?:[^@/]+@)?[^/]+/|[^@\s]+@[^:/\s]+:)(?:.*/)?([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$")
                .expect("valid remote url regex")
        });
        let caps = URL_RE.captures(url.trim())?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for RepoIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// Extract the host of an `http(s)://` URL, ignoring any userinfo.
pub fn https_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split('/').next()?;
    let host = authority.rsplit('@').next()?;
    if host.is_empty() { None } else { Some(host) }
}
