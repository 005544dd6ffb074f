//! Push authorization: only the canonical repository may publish externally.

use crate::core::repo_id::RepoIdentity;
use crate::core::types::{PushDecision, PushTarget, RunContext, WithheldReason};

/// Decide whether a freshly made commit may be pushed to `target`.
pub fn decide_push(
    context: &RunContext,
    canonical: Option<&RepoIdentity>,
    target: &PushTarget,
) -> PushDecision {
    let Some(canonical) = canonical else {
        return PushDecision::Withhold(WithheldReason::NoCanonicalConfigured);
    };
    let Some(actual) = context.repository.as_ref() else {
        return PushDecision::Withhold(WithheldReason::UnknownRepository);
    };
    if actual != canonical {
        return PushDecision::Withhold(WithheldReason::NonCanonical {
            actual: actual.to_string(),
            canonical: canonical.to_string(),
        });
    }
    PushDecision::Push(target.clone())
}
