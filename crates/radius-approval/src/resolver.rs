//! Folds an `ApprovalOutcome` into the pipeline's decision chain (spec §4.3).

use radius_core::clock::Clock;
use radius_core::ids::new_trace_id;
use radius_core::{ApprovalLease, CanonicalEvent, ChallengeSpec, Decision, Severity};
use radius_state::Store;
use std::sync::Arc;

use crate::connector::Connector;
use crate::outcome::ApprovalOutcome;

/// What to do with `timeout` / connector-`error` outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    Deny,
    Alert,
}

/// Static configuration for the approval resolver (spec §4.3).
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Only `"sync_wait"` is implemented; any other value denies.
    pub mode: String,
    pub on_timeout: FallbackPolicy,
    pub on_connector_error: FallbackPolicy,
    pub default_lease_ttl_secs: u64,
    pub max_lease_ttl_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: "sync_wait".to_string(),
            on_timeout: FallbackPolicy::Deny,
            on_connector_error: FallbackPolicy::Deny,
            default_lease_ttl_secs: 1_800,
            max_lease_ttl_secs: 1_800,
        }
    }
}

/// Runs `connector` (after validating `config.mode`) and folds the result
/// into one `Decision` for the pipeline's decision chain, installing a
/// temporary lease in `store` when the outcome grants one.
pub async fn resolve_and_fold(
    channel_name: &str,
    challenge: &ChallengeSpec,
    event: &CanonicalEvent,
    connector: &dyn Connector,
    config: &ResolverConfig,
    store: &Arc<dyn Store>,
    clock: &Arc<dyn Clock>,
) -> Decision {
    if config.mode != "sync_wait" {
        let outcome = ApprovalOutcome::Error { reason: "approval mode not implemented".to_string() };
        return fold(outcome, channel_name, event, config, store, clock);
    }

    let approval_id = new_trace_id();
    let outcome = connector.resolve(&approval_id, challenge, event).await;
    fold(outcome, channel_name, event, config, store, clock)
}

fn fold(
    outcome: ApprovalOutcome,
    channel_name: &str,
    event: &CanonicalEvent,
    config: &ResolverConfig,
    store: &Arc<dyn Store>,
    clock: &Arc<dyn Clock>,
) -> Decision {
    match outcome {
        ApprovalOutcome::Approved => Decision::allow("approval_resolver", "approved"),
        ApprovalOutcome::ApprovedTemporary { ttl_sec } => {
            let requested = ttl_sec.unwrap_or(config.default_lease_ttl_secs);
            let ttl_secs = requested.min(config.max_lease_ttl_secs).max(1);
            let now_ms = clock.now_ms();
            let lease = ApprovalLease {
                id: new_trace_id(),
                session_id: event.session.clone(),
                agent_name: event.agent.clone(),
                tool: "*".to_string(),
                expires_at_ms: now_ms + ttl_secs * 1_000,
                reason: Some("approved_temporary".to_string()),
            };
            if let Err(e) = store.insert_lease(lease) {
                tracing::error!(error = %e, "failed to install approval lease");
            }
            Decision::allow("approval_resolver", format!("approved temporarily for {ttl_secs}s"))
        }
        ApprovalOutcome::Denied { reason } => Decision::deny(
            "approval_resolver",
            format!("{channel_name}: {}", reason.unwrap_or_else(|| "denied".to_string())),
            Severity::High,
        ),
        ApprovalOutcome::Timeout => match config.on_timeout {
            FallbackPolicy::Deny => Decision::deny("approval_resolver", format!("{channel_name}: approval timed out"), Severity::High),
            FallbackPolicy::Alert => Decision::alert("approval_resolver", format!("{channel_name}: approval timed out"), Severity::Medium),
        },
        ApprovalOutcome::Error { reason } => match config.on_connector_error {
            FallbackPolicy::Deny => Decision::deny("approval_resolver", format!("{channel_name}: connector error: {reason}"), Severity::High),
            FallbackPolicy::Alert => Decision::alert("approval_resolver", format!("{channel_name}: connector error: {reason}"), Severity::Medium),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use radius_core::clock::VirtualClock;
    use radius_core::{Channel, Framework, Phase};
    use radius_state::InMemoryStore;

    struct Scripted(ApprovalOutcome);

    #[async_trait]
    impl Connector for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn resolve(&self, _id: &str, _c: &ChallengeSpec, _e: &CanonicalEvent) -> ApprovalOutcome {
            self.0.clone()
        }
    }

    fn challenge() -> ChallengeSpec {
        ChallengeSpec { channel: Channel::Telegram, prompt: "ok?".to_string(), timeout_seconds: 30 }
    }

    fn event() -> CanonicalEvent {
        CanonicalEvent::new(Phase::PreTool, Framework::Generic)
    }

    #[tokio::test]
    async fn approved_yields_allow() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let connector = Scripted(ApprovalOutcome::Approved);
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &ResolverConfig::default(), &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn approved_temporary_installs_lease_and_clamps_ttl() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let config = ResolverConfig { max_lease_ttl_secs: 60, ..ResolverConfig::default() };
        let connector = Scripted(ApprovalOutcome::ApprovedTemporary { ttl_sec: Some(10_000) });
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &config, &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Allow);
        let lease = store.find_active_lease("unknown", None, "Bash", 0).unwrap().unwrap();
        assert_eq!(lease.expires_at_ms, 60_000);
    }

    #[tokio::test]
    async fn denied_yields_deny_prefixed_with_channel() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let connector = Scripted(ApprovalOutcome::Denied { reason: Some("no".to_string()) });
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &ResolverConfig::default(), &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Deny);
        assert!(d.reason.starts_with("telegram:"));
    }

    #[tokio::test]
    async fn timeout_denies_by_default() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let connector = Scripted(ApprovalOutcome::Timeout);
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &ResolverConfig::default(), &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn timeout_alerts_when_configured() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let config = ResolverConfig { on_timeout: FallbackPolicy::Alert, ..ResolverConfig::default() };
        let connector = Scripted(ApprovalOutcome::Timeout);
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &config, &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Alert);
    }

    #[tokio::test]
    async fn unsupported_mode_denies_via_on_connector_error() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let config = ResolverConfig { mode: "async_webhook".to_string(), ..ResolverConfig::default() };
        let connector = Scripted(ApprovalOutcome::Approved);
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &config, &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Deny);
        assert!(d.reason.contains("approval mode not implemented"));
    }

    #[tokio::test]
    async fn unsupported_mode_alerts_when_on_connector_error_configured() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        let config = ResolverConfig {
            mode: "async_webhook".to_string(),
            on_connector_error: FallbackPolicy::Alert,
            ..ResolverConfig::default()
        };
        let connector = Scripted(ApprovalOutcome::Approved);
        let d = resolve_and_fold("telegram", &challenge(), &event(), &connector, &config, &store, &clock).await;
        assert_eq!(d.action, radius_core::Action::Alert);
    }
}
