//! Publisher: commit a changed artifact, then push it if the context is authorized.
//!
//! Commit and push are separate steps ([`commit_step`], [`push_step`]) so each
//! can be exercised on its own against a fake [`Vcs`].

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::core::authorize::decide_push;
use crate::core::gate::{changed, digest_hex};
use crate::core::repo_id::RepoIdentity;
use crate::core::types::{
    Artifact, Identity, PublishOutcome, PushDecision, PushStatus, PushTarget, RunContext,
    SkipReason,
};
use crate::error::PipelineError;
use crate::io::config::SyncConfig;
use crate::io::message::{CommitMessageTemplate, MessageInputs};
use crate::io::vcs::{Vcs, resolve_credential};

/// Everything the publisher needs besides the artifact and run context.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    /// Author/committer identity for every publication commit.
    pub identity: Identity,
    /// Only this repository may push. `None` disables pushing.
    pub canonical: Option<RepoIdentity>,
    pub target: PushTarget,
    /// Environment variable holding the push token; empty for ambient credentials.
    pub token_env: String,
    pub message: CommitMessageTemplate,
}

impl PublishPolicy {
    pub fn from_config(cfg: &SyncConfig) -> anyhow::Result<Self> {
        Ok(Self {
            identity: cfg.identity.clone(),
            canonical: cfg.canonical()?,
            target: cfg.push_target(),
            token_env: cfg.push.token_env.clone(),
            message: CommitMessageTemplate::new(&cfg.commit.message)?,
        })
    }
}

/// Publish `artifact` if it differs from `previous`.
///
/// - unchanged: `Skipped(Unchanged)` with no writes, unless an authorized run
///   finds an earlier publication commit that never reached the remote, which
///   is pushed instead (see [`resume_step`]);
/// - changed: one commit, then one push when the context is canonical, or a
///   withheld push otherwise.
#[instrument(skip_all, fields(artifact = %artifact.path.display(), run_id = %context.run_id))]
pub fn publish<V: Vcs>(
    artifact: &Artifact,
    previous: Option<&[u8]>,
    context: &RunContext,
    policy: &PublishPolicy,
    vcs: &V,
) -> Result<PublishOutcome, PipelineError> {
    if !changed(&artifact.contents, previous) {
        return resume_step(context, policy, vcs);
    }
    let commit = commit_step(artifact, context, policy, vcs)?;
    let push = push_step(&commit, context, policy, vcs)?;
    Ok(PublishOutcome::Published { commit, push })
}

/// Commit the artifact with the policy identity and rendered message.
pub fn commit_step<V: Vcs>(
    artifact: &Artifact,
    context: &RunContext,
    policy: &PublishPolicy,
    vcs: &V,
) -> Result<String, PipelineError> {
    let digest = digest_hex(&artifact.contents);
    let artifact_name = artifact.path.to_string_lossy();
    let trigger = context.trigger.to_string();
    let message = policy
        .message
        .render(&MessageInputs {
            artifact: &artifact_name,
            digest: &digest,
            run_id: &context.run_id,
            trigger: &trigger,
        })
        .map_err(PipelineError::Commit)?;
    vcs.commit_artifact(&artifact.path, &policy.identity, &message)
        .context("commit artifact")
        .map_err(PipelineError::Commit)
}

/// Push a publication commit left local by an earlier failed push.
///
/// Only authorized contexts look for one; everything else is `Skipped(Unchanged)`.
pub fn resume_step<V: Vcs>(
    context: &RunContext,
    policy: &PublishPolicy,
    vcs: &V,
) -> Result<PublishOutcome, PipelineError> {
    let PushDecision::Push(target) = decide_push(context, policy.canonical.as_ref(), &policy.target)
    else {
        info!("artifact unchanged, nothing to publish");
        return Ok(PublishOutcome::Skipped(SkipReason::Unchanged));
    };
    let pending = vcs
        .unpushed_publication(&target, &policy.identity)
        .context("look for unpushed publication commit")
        .map_err(PipelineError::Diff)?;
    let Some(commit) = pending else {
        info!("artifact unchanged, nothing to publish");
        return Ok(PublishOutcome::Skipped(SkipReason::Unchanged));
    };
    info!(commit = %commit, "artifact unchanged, pushing earlier unpushed publication");
    let push = push_step(&commit, context, policy, vcs)?;
    Ok(PublishOutcome::Published { commit, push })
}

/// Push `commit` if the run context is authorized; otherwise report why not.
pub fn push_step<V: Vcs>(
    commit: &str,
    context: &RunContext,
    policy: &PublishPolicy,
    vcs: &V,
) -> Result<PushStatus, PipelineError> {
    let target = match decide_push(context, policy.canonical.as_ref(), &policy.target) {
        PushDecision::Push(target) => target,
        PushDecision::Withhold(reason) => {
            warn!(reason = %reason, commit, "push withheld, commit kept local");
            return Ok(PushStatus::Withheld(reason));
        }
    };
    let push_err = |source: anyhow::Error| PipelineError::Push {
        commit: commit.to_string(),
        source,
    };
    let credential = resolve_credential(&policy.token_env).map_err(push_err)?;
    vcs.push(&target, credential.as_ref()).map_err(push_err)?;
    info!(remote = %target.remote, branch = %target.branch, commit, "published");
    Ok(PushStatus::Pushed {
        remote: target.remote,
        branch: target.branch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::core::types::{Trigger, WithheldReason};
    use crate::test_support::RecordingVcs;

    fn policy(canonical: Option<&str>) -> PublishPolicy {
        let cfg = SyncConfig {
            canonical_repository: canonical.map(str::to_string),
            ..SyncConfig::default()
        };
        let mut policy = PublishPolicy::from_config(&cfg).expect("policy");
        policy.token_env = String::new();
        policy
    }

    fn context(repository: &str) -> RunContext {
        RunContext {
            run_id: "20260101T000000Z-abc1234".to_string(),
            trigger: Trigger::Manual,
            repository: Some(RepoIdentity::parse(repository).expect("slug")),
        }
    }

    fn artifact(contents: &[u8]) -> Artifact {
        Artifact {
            path: PathBuf::from("metadata.xml"),
            contents: contents.to_vec(),
        }
    }

    #[test]
    fn unchanged_performs_no_writes() {
        let vcs = RecordingVcs::default();
        let outcome = publish(
            &artifact(b"<meta/>"),
            Some(b"<meta/>".as_slice()),
            &context("acme/metadata"),
            &policy(Some("acme/metadata")),
            &vcs,
        )
        .expect("publish");
        assert_eq!(outcome, PublishOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(vcs.commit_count(), 0);
        assert_eq!(vcs.push_count(), 0);
    }

    #[test]
    fn changed_canonical_commits_and_pushes_once() {
        let vcs = RecordingVcs::default();
        let outcome = publish(
            &artifact(b"<meta>2</meta>"),
            Some(b"<meta>1</meta>".as_slice()),
            &context("acme/metadata"),
            &policy(Some("acme/metadata")),
            &vcs,
        )
        .expect("publish");
        assert!(outcome.pushed());
        assert_eq!(vcs.commit_count(), 1);
        assert_eq!(vcs.push_count(), 1);

        let commits = vcs.commits();
        assert_eq!(commits[0].identity, Identity::default());
        assert_eq!(commits[0].path, PathBuf::from("metadata.xml"));
        assert!(commits[0].message.starts_with("Sync metadata.xml ("));
    }

    #[test]
    fn changed_fork_commits_without_pushing() {
        let vcs = RecordingVcs::default();
        let outcome = publish(
            &artifact(b"<meta>2</meta>"),
            None,
            &context("someone/metadata"),
            &policy(Some("acme/metadata")),
            &vcs,
        )
        .expect("publish");
        assert_eq!(vcs.commit_count(), 1);
        assert_eq!(vcs.push_count(), 0);
        match outcome {
            PublishOutcome::Published {
                push: PushStatus::Withheld(WithheldReason::NonCanonical { actual, .. }),
                ..
            } => assert_eq!(actual, "someone/metadata"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn identity_is_taken_from_policy() {
        let vcs = RecordingVcs::default();
        let mut policy = policy(None);
        policy.identity = Identity {
            name: "Metadata Bot".to_string(),
            email: "bot@example.org".to_string(),
        };
        publish(
            &artifact(b"x"),
            None,
            &context("acme/metadata"),
            &policy,
            &vcs,
        )
        .expect("publish");
        assert_eq!(vcs.commits()[0].identity.name, "Metadata Bot");
    }

    #[test]
    fn commit_failure_is_fatal_and_skips_push() {
        let vcs = RecordingVcs::failing_commit();
        let err = publish(
            &artifact(b"x"),
            None,
            &context("acme/metadata"),
            &policy(Some("acme/metadata")),
            &vcs,
        )
        .expect_err("commit should fail");
        assert!(matches!(err, PipelineError::Commit(_)));
        assert_eq!(vcs.push_count(), 0);
    }

    #[test]
    fn push_failure_is_reported_with_local_commit() {
        let vcs = RecordingVcs::failing_push();
        let err = publish(
            &artifact(b"x"),
            None,
            &context("acme/metadata"),
            &policy(Some("acme/metadata")),
            &vcs,
        )
        .expect_err("push should fail");
        assert_eq!(vcs.commit_count(), 1);
        assert_eq!(err.local_commit(), Some(vcs.commits()[0].id.as_str()));
    }

    #[test]
    fn unchanged_run_pushes_commit_left_by_failed_push() {
        let vcs = RecordingVcs::failing_push();
        let canonical = policy(Some("acme/metadata"));
        publish(
            &artifact(b"x"),
            None,
            &context("acme/metadata"),
            &canonical,
            &vcs,
        )
        .expect_err("push should fail");
        assert_eq!(vcs.push_count(), 0);

        vcs.set_push_failure(false);
        let outcome = publish(
            &artifact(b"x"),
            Some(b"x".as_slice()),
            &context("acme/metadata"),
            &canonical,
            &vcs,
        )
        .expect("resume");
        assert_eq!(outcome.commit(), Some("commit-1"));
        assert!(outcome.pushed());
        assert_eq!(vcs.commit_count(), 1);
        assert_eq!(vcs.push_count(), 1);

        let outcome = publish(
            &artifact(b"x"),
            Some(b"x".as_slice()),
            &context("acme/metadata"),
            &canonical,
            &vcs,
        )
        .expect("converged");
        assert_eq!(outcome, PublishOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(vcs.push_count(), 1);
    }

    #[test]
    fn unchanged_fork_run_leaves_local_commit_alone() {
        let vcs = RecordingVcs::default();
        let fork = context("someone/metadata");
        let canonical = policy(Some("acme/metadata"));
        publish(&artifact(b"x"), None, &fork, &canonical, &vcs).expect("commit");

        let outcome = publish(
            &artifact(b"x"),
            Some(b"x".as_slice()),
            &fork,
            &canonical,
            &vcs,
        )
        .expect("publish");
        assert_eq!(outcome, PublishOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(vcs.push_count(), 0);
    }

    #[test]
    fn missing_token_fails_the_push_only_when_authorized() {
        let vcs = RecordingVcs::default();
        let mut canonical = policy(Some("acme/metadata"));
        canonical.token_env = "METASYNC_TEST_TOKEN_THAT_IS_NEVER_SET".to_string();
        let err = publish(
            &artifact(b"x"),
            None,
            &context("acme/metadata"),
            &canonical,
            &vcs,
        )
        .expect_err("push should fail");
        assert!(matches!(err, PipelineError::Push { .. }));
        assert_eq!(vcs.push_count(), 0);

        let vcs = RecordingVcs::default();
        let outcome = publish(
            &artifact(b"x"),
            None,
            &context("someone/metadata"),
            &canonical,
            &vcs,
        )
        .expect("fork run does not need a token");
        assert!(!outcome.pushed());
    }
}
