//! 4.2.12 approval_gate — routes a tool call to a challenge on a resolved
//! human-approval channel.

use async_trait::async_trait;
use radius_core::clock::Clock;
use radius_core::{CanonicalEvent, ChallengeSpec, Channel, Decision, Module, ModuleError, ModuleMode, Phase};
use radius_state::Store;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::{parse_mode, str_list};

const DEFAULT_METADATA_KEYS: [&str; 3] = ["channel", "transportChannel", "messenger"];

#[derive(Debug, Clone)]
struct Rule {
    tool: String,
    channel: Option<Channel>,
    prompt: Option<String>,
    timeout_seconds: u64,
}

impl Rule {
    fn matches(&self, tool_name: &str) -> bool {
        self.tool == "*" || self.tool == tool_name
    }
}

fn parse_channel(s: &str) -> Option<Channel> {
    match s {
        "orchestrator" => Some(Channel::Orchestrator),
        "telegram" => Some(Channel::Telegram),
        "discord" => Some(Channel::Discord),
        "http" => Some(Channel::Http),
        _ => None,
    }
}

pub struct ApprovalGate {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    rules: Vec<Rule>,
    metadata_keys: Vec<String>,
    framework_default: Option<Channel>,
    global_default: Channel,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ApprovalGate {
    pub fn new(cfg: &Value, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let rules = cfg
            .get("rules")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|r| Rule {
                        tool: r.get("tool").and_then(Value::as_str).unwrap_or("*").to_string(),
                        channel: r.get("channel").and_then(Value::as_str).and_then(parse_channel),
                        prompt: r.get("prompt").and_then(Value::as_str).map(str::to_string),
                        timeout_seconds: r.get("timeoutSeconds").and_then(Value::as_u64).unwrap_or(120),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let metadata_keys = {
            let configured = str_list(cfg, "metadataKeys");
            if configured.is_empty() {
                DEFAULT_METADATA_KEYS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            rules,
            metadata_keys,
            framework_default: cfg.get("frameworkDefault").and_then(Value::as_str).and_then(parse_channel),
            global_default: cfg
                .get("globalDefault")
                .and_then(Value::as_str)
                .and_then(parse_channel)
                .unwrap_or(Channel::Telegram),
            store,
            clock,
        }
    }

    fn resolve_channel(&self, rule: &Rule, event: &CanonicalEvent) -> Channel {
        if let Some(channel) = rule.channel {
            return channel;
        }
        for key in &self.metadata_keys {
            if let Some(value) = event.metadata_str(key).and_then(parse_channel) {
                return value;
            }
        }
        self.framework_default.unwrap_or(self.global_default)
    }
}

#[async_trait]
impl Module for ApprovalGate {
    fn name(&self) -> &str {
        "approval_gate"
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
        let Some(rule) = self.rules.iter().find(|r| r.matches(&call.name)) else {
            return Ok(Decision::allow(self.name(), "no matching approval rule"));
        };

        let now_ms = self.clock.now_ms();
        let lease = self
            .store
            .find_active_lease(&event.session, event.agent.as_deref(), &call.name, now_ms)
            .map_err(|e| ModuleError::new(e.to_string()))?;
        if let Some(lease) = lease {
            return Ok(Decision::allow(
                self.name(),
                format!("active approval lease {} covers this call", lease.id),
            ));
        }

        let channel = self.resolve_channel(rule, event);
        let prompt = rule
            .prompt
            .clone()
            .unwrap_or_else(|| format!("Approve execution of \"{}\"?", call.name));
        Ok(Decision::challenge(
            self.name(),
            format!("approval required for tool \"{}\"", call.name),
            ChallengeSpec {
                channel,
                prompt,
                timeout_seconds: rule.timeout_seconds,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::clock::VirtualClock;
    use radius_core::{ApprovalLease, Framework, ToolCall};
    use radius_state::InMemoryStore;
    use serde_json::json;

    fn event(tool: &str) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        e.tool_call = Some(ToolCall {
            name: tool.to_string(),
            arguments: serde_json::Map::new(),
            raw: None,
        });
        e
    }

    fn gate(cfg: Value) -> ApprovalGate {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        ApprovalGate::new(&cfg, store, clock)
    }

    #[tokio::test]
    async fn wildcard_rule_matches_any_tool() {
        let cfg = json!({"rules": [{"tool": "*", "channel": "telegram"}]});
        let gate = gate(cfg);
        let decision = gate.evaluate(&event("Bash")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Challenge);
        assert_eq!(decision.challenge.unwrap().channel, Channel::Telegram);
    }

    #[tokio::test]
    async fn metadata_channel_used_when_rule_channel_is_auto() {
        let cfg = json!({"rules": [{"tool": "Bash"}]});
        let gate = gate(cfg);
        let mut e = event("Bash");
        e.metadata.insert("channel".to_string(), json!("discord"));
        let decision = gate.evaluate(&e).await.unwrap();
        assert_eq!(decision.challenge.unwrap().channel, Channel::Discord);
    }

    #[tokio::test]
    async fn no_matching_rule_allows() {
        let cfg = json!({"rules": [{"tool": "Write"}]});
        let gate = gate(cfg);
        let decision = gate.evaluate(&event("Bash")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn active_lease_suppresses_challenge_without_new_prompt() {
        let cfg = json!({"rules": [{"tool": "Bash", "channel": "telegram"}]});
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(0));
        store
            .insert_lease(ApprovalLease {
                id: "l1".to_string(),
                session_id: "unknown".to_string(),
                agent_name: None,
                tool: "*".to_string(),
                expires_at_ms: 120_000,
                reason: Some("approved_temporary".to_string()),
            })
            .unwrap();
        let gate = ApprovalGate::new(&cfg, store, clock);
        let decision = gate.evaluate(&event("Bash")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn expired_lease_still_challenges() {
        let cfg = json!({"rules": [{"tool": "Bash", "channel": "telegram"}]});
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(200_000));
        store
            .insert_lease(ApprovalLease {
                id: "l1".to_string(),
                session_id: "unknown".to_string(),
                agent_name: None,
                tool: "*".to_string(),
                expires_at_ms: 120_000,
                reason: None,
            })
            .unwrap();
        let gate = ApprovalGate::new(&cfg, store, clock);
        let decision = gate.evaluate(&event("Bash")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Challenge);
    }
}
