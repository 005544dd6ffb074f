//! Resolution of the ephemeral run context (trigger, repository identity, run id).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::core::repo_id::RepoIdentity;
use crate::core::types::{RunContext, Trigger};
use crate::io::git::Git;

/// Caller-supplied context inputs (CLI flags or CI environment).
#[derive(Debug, Clone, Default)]
pub struct ContextInputs {
    /// Dispatch event type; `None` means a manual run.
    pub event: Option<String>,
    /// Explicit `owner/name` of the repository the run executes in.
    pub repository: Option<String>,
}

/// Build the run context for a run starting at `now`.
///
/// The repository identity comes from `inputs.repository` if given, otherwise
/// from the URL of `remote`. A repository that cannot be identified yields
/// `None`, which the push authorization treats as unauthorized.
pub fn resolve_run_context(
    git: &Git,
    inputs: &ContextInputs,
    remote: &str,
    now: DateTime<Utc>,
) -> Result<RunContext> {
    let trigger = match inputs.event.as_deref().map(str::trim) {
        Some(event) if !event.is_empty() => Trigger::Dispatch {
            event: event.to_string(),
        },
        _ => Trigger::Manual,
    };

    let repository = match inputs.repository.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => {
            Some(RepoIdentity::parse(slug).context("invalid --repository")?)
        }
        _ if git.is_repository() => git
            .remote_url(remote)?
            .as_deref()
            .and_then(RepoIdentity::from_remote_url),
        _ => None,
    };

    let short_sha = if git.is_repository() {
        git.head_short_sha(7)?
    } else {
        None
    };
    let run_id = run_id_for(now, short_sha.as_deref());
    debug!(run_id = %run_id, trigger = %trigger, repository = ?repository, "run context resolved");
    Ok(RunContext {
        run_id,
        trigger,
        repository,
    })
}

/// Repository identity derived from the URL of `remote`.
///
/// Errors reading the URL are logged and yield `None`, which withholds pushes.
pub fn repository_from_remote(git: &Git, remote: &str) -> Option<RepoIdentity> {
    match git.remote_url(remote) {
        Ok(url) => url.as_deref().and_then(RepoIdentity::from_remote_url),
        Err(err) => {
            warn!(
                err = %format!("{err:#}"),
                remote,
                "cannot read remote url, repository identity unknown"
            );
            None
        }
    }
}

/// `<UTC %Y%m%dT%H%M%SZ>-<short sha | nohead>`.
pub fn run_id_for(now: DateTime<Utc>, short_sha: Option<&str>) -> String {
    format!(
        "{}-{}",
        now.format("%Y%m%dT%H%M%SZ"),
        short_sha.unwrap_or("nohead")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn run_id_embeds_timestamp_and_sha() {
        assert_eq!(
            run_id_for(fixed_now(), Some("abc1234")),
            "20260304T050607Z-abc1234"
        );
        assert_eq!(run_id_for(fixed_now(), None), "20260304T050607Z-nohead");
    }

    #[test]
    fn explicit_inputs_outside_a_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path().join("absent"));
        let ctx = resolve_run_context(
            &git,
            &ContextInputs {
                event: Some("sync".to_string()),
                repository: Some("acme/metadata".to_string()),
            },
            "origin",
            fixed_now(),
        )
        .expect("context");
        assert_eq!(
            ctx.trigger,
            Trigger::Dispatch {
                event: "sync".to_string()
            }
        );
        assert_eq!(ctx.repository, Some(RepoIdentity::new("acme", "metadata")));
        assert_eq!(ctx.run_id, "20260304T050607Z-nohead");
    }

    #[test]
    fn blank_event_is_manual_and_unknown_repo_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path().join("absent"));
        let ctx = resolve_run_context(
            &git,
            &ContextInputs {
                event: Some("  ".to_string()),
                repository: None,
            },
            "origin",
            fixed_now(),
        )
        .expect("context");
        assert_eq!(ctx.trigger, Trigger::Manual);
        assert_eq!(ctx.repository, None);
    }

    #[test]
    fn unreadable_remote_yields_no_identity() {
        let temp = tempfile::tempdir().expect("tempdir");
        // git cannot even be spawned in a missing directory.
        let git = Git::new(temp.path().join("absent"));
        assert!(git.remote_url("origin").is_err());
        assert_eq!(repository_from_remote(&git, "origin"), None);
    }

    #[test]
    fn hosted_remote_yields_identity() {
        let repo = crate::test_support::TestRepo::new().expect("repo");
        repo.git(&[
            "remote",
            "set-url",
            "origin",
            "https://github.com/acme/metadata.git",
        ])
        .expect("set-url");
        let git = Git::new(repo.path());
        assert_eq!(
            repository_from_remote(&git, "origin"),
            Some(RepoIdentity::new("acme", "metadata"))
        );
        assert_eq!(repository_from_remote(&git, "upstream"), None);
    }

    #[test]
    fn invalid_repository_flag_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        let inputs = ContextInputs {
            event: None,
            repository: Some("nope".to_string()),
        };
        assert!(resolve_run_context(&git, &inputs, "origin", fixed_now()).is_err());
    }
}
