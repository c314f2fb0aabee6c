//! The connector contract every approval channel implements (spec §4.3).

use async_trait::async_trait;
use radius_core::{CanonicalEvent, ChallengeSpec};

use crate::outcome::ApprovalOutcome;

/// One channel capable of resolving a challenge to an `ApprovalOutcome`.
/// Implementations must themselves respect `challenge.timeout_seconds` and
/// return `ApprovalOutcome::Timeout` rather than hang past the deadline.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, approval_id: &str, challenge: &ChallengeSpec, event: &CanonicalEvent) -> ApprovalOutcome;
}
