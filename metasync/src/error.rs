//! Stage-classified pipeline errors.

use thiserror::Error;

use crate::core::types::Stage;

/// Errors that abort a pipeline run, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed")]
    Fetch(#[source] anyhow::Error),

    #[error("setup failed")]
    Setup(#[source] anyhow::Error),

    #[error("generator failed")]
    Generate(#[source] anyhow::Error),

    /// The previously published version could not be read, so it is unsafe to
    /// decide whether to publish.
    #[error("diff failed")]
    Diff(#[source] anyhow::Error),

    #[error("commit failed")]
    Commit(#[source] anyhow::Error),

    /// The commit exists locally; only the push failed.
    #[error("push of commit {commit} failed")]
    Push {
        commit: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Fetch(_) => Stage::Fetch,
            PipelineError::Setup(_) => Stage::Setup,
            PipelineError::Generate(_) => Stage::Generate,
            PipelineError::Diff(_) => Stage::Diff,
            PipelineError::Commit(_) => Stage::Commit,
            PipelineError::Push { .. } => Stage::Push,
        }
    }

    /// Message including the full cause chain, e.g. for run summaries.
    pub fn detail(&self) -> String {
        let cause = match self {
            PipelineError::Fetch(err)
            | PipelineError::Setup(err)
            | PipelineError::Generate(err)
            | PipelineError::Diff(err)
            | PipelineError::Commit(err)
            | PipelineError::Push { source: err, .. } => err,
        };
        format!("{self}: {cause:#}")
    }

    /// Local commit left behind by a failed push, if any.
    pub fn local_commit(&self) -> Option<&str> {
        match self {
            PipelineError::Push { commit, .. } => Some(commit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn push_error_keeps_commit_and_stage() {
        let err = PipelineError::Push {
            commit: "abc123".to_string(),
            source: anyhow!("remote rejected"),
        };
        assert_eq!(err.stage(), Stage::Push);
        assert_eq!(err.local_commit(), Some("abc123"));
        assert_eq!(err.to_string(), "push of commit abc123 failed");
        assert_eq!(
            err.detail(),
            "push of commit abc123 failed: remote rejected"
        );
    }

    #[test]
    fn generator_error_has_no_commit() {
        let err = PipelineError::Generate(anyhow!("exit status 1"));
        assert_eq!(err.stage(), Stage::Generate);
        assert_eq!(err.local_commit(), None);
        let chained = anyhow::Error::new(err);
        assert_eq!(
            format!("{chained:#}"),
            "generator failed: exit status 1"
        );
    }
}
