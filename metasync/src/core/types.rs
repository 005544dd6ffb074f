//! Shared deterministic types for the publication pipeline.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::repo_id::RepoIdentity;

/// Regenerated artifact content, addressed by its path relative to the repo root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// What started the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Trigger {
    /// Invoked by hand (`workflow_dispatch` style).
    Manual,
    /// Invoked by an external event carrying a type, e.g. `sync`.
    Dispatch { event: String },
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => f.write_str("manual"),
            Trigger::Dispatch { event } => write!(f, "dispatch:{event}"),
        }
    }
}

/// Ephemeral description of the invoking context. Created at run start,
/// discarded at run end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub trigger: Trigger,
    /// Identity of the repository the run executes in, if it could be determined.
    pub repository: Option<RepoIdentity>,
}

/// Commit author/committer identity, passed explicitly to every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Where an authorized push goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushTarget {
    /// Remote name or URL.
    pub remote: String,
    pub branch: String,
}

/// Why a run ended without writing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Regenerated artifact is byte-identical to the committed one.
    Unchanged,
    /// Dispatch event type is not in `accepted_events`.
    IgnoredEvent { event: String },
}

/// Why a commit was kept local instead of being pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WithheldReason {
    /// No `canonical_repository` is configured, so nothing is ever pushed.
    NoCanonicalConfigured,
    /// The run context has no repository identity to compare against.
    UnknownRepository,
    /// The run executes in a different repository (e.g. a fork).
    NonCanonical { actual: String, canonical: String },
}

impl fmt::Display for WithheldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithheldReason::NoCanonicalConfigured => f.write_str("no canonical repository configured"),
            WithheldReason::UnknownRepository => f.write_str("repository identity unknown"),
            WithheldReason::NonCanonical { actual, canonical } => {
                write!(f, "{actual} is not the canonical repository {canonical}")
            }
        }
    }
}

/// Result of the authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDecision {
    Push(PushTarget),
    Withhold(WithheldReason),
}

/// What happened to a commit after it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushStatus {
    Pushed { remote: String, branch: String },
    Withheld(WithheldReason),
}

/// Final outcome of a publication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Nothing was written.
    Skipped(SkipReason),
    /// A commit was made; `push` says whether it left the machine.
    Published { commit: String, push: PushStatus },
}

impl PublishOutcome {
    pub fn commit(&self) -> Option<&str> {
        match self {
            PublishOutcome::Published { commit, .. } => Some(commit),
            PublishOutcome::Skipped(_) => None,
        }
    }

    pub fn pushed(&self) -> bool {
        matches!(
            self,
            PublishOutcome::Published {
                push: PushStatus::Pushed { .. },
                ..
            }
        )
    }
}

/// Pipeline stage, used to classify failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Setup,
    Generate,
    Diff,
    Commit,
    Push,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Setup => "setup",
            Stage::Generate => "generate",
            Stage::Diff => "diff",
            Stage::Commit => "commit",
            Stage::Push => "push",
        };
        f.write_str(name)
    }
}
