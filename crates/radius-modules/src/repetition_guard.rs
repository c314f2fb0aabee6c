//! 4.2.9 repetition_guard — detects a tool call repeated past a cooldown
//! threshold, using a fingerprint of the call shape.

use async_trait::async_trait;
use radius_core::clock::Clock;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use radius_state::Store;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::parse_mode;
use crate::fingerprint::fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnRepeat {
    Deny,
    Alert,
}

pub struct RepetitionGuard {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    threshold: u64,
    cooldown_ms: u64,
    on_repeat: OnRepeat,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RepetitionGuard {
    pub fn new(cfg: &Value, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let cooldown_sec = cfg.get("cooldownSec").and_then(Value::as_u64).unwrap_or(30);
        let on_repeat = match cfg.get("onRepeat").and_then(Value::as_str) {
            Some("alert") => OnRepeat::Alert,
            _ => OnRepeat::Deny,
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            threshold: cfg.get("threshold").and_then(Value::as_u64).unwrap_or(3),
            cooldown_ms: cooldown_sec * 1000,
            on_repeat,
            store,
            clock,
        }
    }
}

fn bucket_key(event: &CanonicalEvent) -> String {
    format!(
        "{:?}|{}|{}|{}",
        event.framework,
        event.session,
        event.agent.as_deref().unwrap_or(""),
        event.user.as_deref().unwrap_or("")
    )
}

#[async_trait]
impl Module for RepetitionGuard {
    fn name(&self) -> &str {
        "repetition_guard"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        let Some(call) = &event.tool_call else {
            return Ok(Decision::allow(self.name(), "no tool call"));
        };
        let fp = fingerprint(&call.name, &Value::Object(call.arguments.clone()));
        let bucket = bucket_key(event);
        let now_ms = self.clock.now_ms();
        let count = self
            .store
            .consume_repetition(&bucket, &fp, now_ms, self.cooldown_ms)
            .map_err(|e| ModuleError::new(e.to_string()))?;

        if count < self.threshold {
            return Ok(Decision::allow(self.name(), format!("repeat count {count} below threshold")));
        }
        let reason = format!("identical call repeated {count} times within cooldown");
        match self.on_repeat {
            OnRepeat::Deny => Ok(Decision::deny(self.name(), reason, Severity::High)),
            OnRepeat::Alert => Ok(Decision::alert(self.name(), reason, Severity::High)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::clock::VirtualClock;
    use radius_core::{Framework, ToolCall};
    use radius_state::InMemoryStore;
    use serde_json::json;

    fn event_with_command(command: &str) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let mut args = serde_json::Map::new();
        args.insert("command".to_string(), json!(command));
        e.tool_call = Some(ToolCall {
            name: "Bash".to_string(),
            arguments: args,
            raw: None,
        });
        e
    }

    #[tokio::test]
    async fn third_identical_call_denies_at_threshold_three() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(VirtualClock::new(0));
        let guard = RepetitionGuard::new(&json!({"threshold": 3, "cooldownSec": 30}), store, clock.clone());
        let event = event_with_command("echo hi");

        for _ in 0..2 {
            let decision = guard.evaluate(&event).await.unwrap();
            assert_eq!(decision.action, radius_core::Action::Allow);
            clock.advance_ms(1_000);
        }
        let decision = guard.evaluate(&event).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn different_calls_do_not_accumulate() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(VirtualClock::new(0));
        let guard = RepetitionGuard::new(&json!({"threshold": 3}), store, clock);
        let decision_a = guard.evaluate(&event_with_command("echo a")).await.unwrap();
        let decision_b = guard.evaluate(&event_with_command("echo b")).await.unwrap();
        assert_eq!(decision_a.action, radius_core::Action::Allow);
        assert_eq!(decision_b.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn cooldown_expiry_resets_streak() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(VirtualClock::new(0));
        let guard = RepetitionGuard::new(&json!({"threshold": 3, "cooldownSec": 5}), store, clock.clone());
        let event = event_with_command("echo hi");
        guard.evaluate(&event).await.unwrap();
        clock.advance_ms(6_000);
        guard.evaluate(&event).await.unwrap();
        clock.advance_ms(1_000);
        let decision = guard.evaluate(&event).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }
}
