//! 4.2.10 tripwire_guard — honeytoken paths and environment-variable names
//! that should never be touched or referenced; tripping one can optionally
//! latch the kill switch.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::canon::{canonicalize, is_within};
use crate::common::{parse_mode, str_list};

const PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripwireAction {
    Alert,
    Deny,
    KillSwitch,
}

#[derive(Debug, Clone)]
enum FileRule {
    Exact(PathBuf),
    Prefix(PathBuf),
}

pub struct TripwireGuard {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    file_rules: Vec<FileRule>,
    env_tokens: Vec<String>,
    action: TripwireAction,
    kill_switch_path: PathBuf,
    home: PathBuf,
    cwd: PathBuf,
}

impl TripwireGuard {
    pub fn new(cfg: &Value) -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let file_rules = cfg
            .get("fileRules")
            .and_then(Value::as_array)
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|r| {
                        let path = r.get("path").and_then(Value::as_str)?;
                        let canonical = canonicalize(path.trim_end_matches("/**"), &home, &cwd);
                        match r.get("type").and_then(Value::as_str) {
                            Some("prefix") => Some(FileRule::Prefix(canonical)),
                            _ => Some(FileRule::Exact(canonical)),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        let action = match cfg.get("action").and_then(Value::as_str) {
            Some("deny") => TripwireAction::Deny,
            Some("kill_switch") => TripwireAction::KillSwitch,
            _ => TripwireAction::Alert,
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            file_rules,
            env_tokens: str_list(cfg, "envTokens"),
            action,
            kill_switch_path: cfg
                .get("killSwitchPath")
                .and_then(Value::as_str)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.radius/kill_switch")),
            home,
            cwd,
        }
    }

    fn candidate_paths(&self, args: &serde_json::Map<String, Value>) -> Vec<String> {
        let mut candidates = Vec::new();
        for key in PATH_KEYS {
            if let Some(v) = args.get(key).and_then(Value::as_str) {
                candidates.push(v.to_string());
            }
        }
        if let Some(command) = args.get("command").and_then(Value::as_str) {
            for token in command.split_whitespace() {
                if token.starts_with('/') || token.starts_with('~') || token.contains('/') {
                    candidates.push(token.trim_matches(|c| c == '"' || c == '\'').to_string());
                }
            }
        }
        candidates
    }

    fn matches(&self, canonical: &PathBuf) -> bool {
        self.file_rules.iter().any(|rule| match rule {
            FileRule::Exact(p) => p == canonical,
            FileRule::Prefix(p) => is_within(p, canonical),
        })
    }

    fn trigger(&self, reason: String) -> Decision {
        match self.action {
            TripwireAction::Alert => Decision::alert(self.name(), reason, Severity::High),
            TripwireAction::Deny => Decision::deny(self.name(), reason, Severity::Critical),
            TripwireAction::KillSwitch => {
                let _ = std::fs::write(&self.kill_switch_path, b"1");
                Decision::deny(self.name(), reason, Severity::Critical)
            }
        }
    }
}

#[async_trait]
impl Module for TripwireGuard {
    fn name(&self) -> &str {
        "tripwire_guard"
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

        if !self.env_tokens.is_empty() {
            let serialized = serde_json::to_string(&call.arguments).unwrap_or_default();
            if let Some(token) = self.env_tokens.iter().find(|t| serialized.contains(t.as_str())) {
                return Ok(self.trigger(format!("arguments reference tripwire env token \"{token}\"")));
            }
        }

        for raw in self.candidate_paths(&call.arguments) {
            let canonical = canonicalize(&raw, &self.home, &self.cwd);
            if self.matches(&canonical) {
                return Ok(self.trigger(format!("{} matches a tripwire file rule", canonical.display())));
            }
        }

        Ok(Decision::allow(self.name(), "no tripwire match"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    fn event_with_path(path: &str) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let mut args = serde_json::Map::new();
        args.insert("file_path".to_string(), json!(path));
        e.tool_call = Some(ToolCall {
            name: "Read".to_string(),
            arguments: args,
            raw: None,
        });
        e
    }

    #[tokio::test]
    async fn exact_rule_triggers_alert_by_default() {
        let cfg = json!({"fileRules": [{"type": "exact", "path": "/workspace/honeytoken.txt"}]});
        let guard = TripwireGuard::new(&cfg);
        let decision = guard.evaluate(&event_with_path("/workspace/honeytoken.txt")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Alert);
    }

    #[tokio::test]
    async fn prefix_rule_matches_nested_path() {
        let cfg = json!({
            "fileRules": [{"type": "prefix", "path": "/workspace/secrets/**"}],
            "action": "deny",
        });
        let guard = TripwireGuard::new(&cfg);
        let decision = guard.evaluate(&event_with_path("/workspace/secrets/nested/x.txt")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn env_token_in_arguments_denies() {
        let cfg = json!({"envTokens": ["AWS_SECRET_HONEYPOT"], "action": "deny"});
        let guard = TripwireGuard::new(&cfg);
        let mut e = event_with_path("/tmp/irrelevant");
        e.tool_call.as_mut().unwrap().arguments.insert(
            "note".to_string(),
            json!("reading AWS_SECRET_HONEYPOT value"),
        );
        let decision = guard.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn unrelated_path_allows() {
        let cfg = json!({"fileRules": [{"type": "exact", "path": "/workspace/honeytoken.txt"}]});
        let guard = TripwireGuard::new(&cfg);
        let decision = guard.evaluate(&event_with_path("/workspace/readme.txt")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }
}
