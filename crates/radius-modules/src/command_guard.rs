//! 4.2.4 command_guard — deny/allow pattern matching over shell command
//! segments.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::common::{parse_mode, str_list, str_set};

const DEFAULT_SHELL_TOOLS: [&str; 1] = ["Bash"];
const SEGMENT_SEPARATORS: [&str; 4] = ["&&", "||", ";", "|"];

fn builtin_deny_patterns() -> Vec<&'static str> {
    vec![r"(?i)(^|\s)sudo\s", r"(?i)rm\s+-rf\s+/"]
}

fn split_segments(command: &str) -> Vec<String> {
    let mut segments = vec![command.to_string()];
    for sep in SEGMENT_SEPARATORS {
        segments = segments
            .into_iter()
            .flat_map(|s| s.split(sep).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct CommandGuard {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    shell_tools: HashSet<String>,
    deny_patterns: Vec<Regex>,
    allow_patterns: Vec<Regex>,
}

impl CommandGuard {
    pub fn new(cfg: &Value) -> Self {
        let shell_tools = {
            let configured = str_set(cfg, "shellTools");
            if configured.is_empty() {
                DEFAULT_SHELL_TOOLS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        let mut deny_patterns: Vec<Regex> = builtin_deny_patterns()
            .into_iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        deny_patterns.extend(
            str_list(cfg, "denyPatterns")
                .iter()
                .filter_map(|p| Regex::new(&format!("(?i){p}")).ok()),
        );
        let allow_patterns = str_list(cfg, "allowPatterns")
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
            .collect();
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            shell_tools,
            deny_patterns,
            allow_patterns,
        }
    }
}

#[async_trait]
impl Module for CommandGuard {
    fn name(&self) -> &str {
        "command_guard"
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
        if !self.shell_tools.contains(&call.name) {
            return Ok(Decision::allow(self.name(), "not a shell tool"));
        }
        let Some(command) = call.arguments.get("command").and_then(Value::as_str) else {
            return Ok(Decision::allow(self.name(), "no command argument"));
        };

        for segment in split_segments(command) {
            if let Some(pattern) = self.deny_patterns.iter().find(|re| re.is_match(&segment)) {
                return Ok(Decision::deny(
                    self.name(),
                    format!("segment \"{segment}\" matches denied pattern {}", pattern.as_str()),
                    Severity::Critical,
                ));
            }
            if !self.allow_patterns.is_empty()
                && !self.allow_patterns.iter().any(|re| re.is_match(&segment))
            {
                return Ok(Decision::deny(
                    self.name(),
                    format!("segment \"{segment}\" matches no allowlisted pattern"),
                    Severity::High,
                ));
            }
        }

        Ok(Decision::allow(self.name(), "no denied or disallowed segment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    fn event(command: &str) -> CanonicalEvent {
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
    async fn sudo_is_denied_by_default() {
        let guard = CommandGuard::new(&json!({}));
        let decision = guard.evaluate(&event("echo ok && sudo rm -rf /")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert!(decision.reason.contains("sudo") || decision.reason.to_lowercase().contains("sudo"));
    }

    #[tokio::test]
    async fn benign_command_allowed() {
        let guard = CommandGuard::new(&json!({}));
        let decision = guard.evaluate(&event("echo hello")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn allowlist_rejects_unmatched_segments() {
        let cfg = json!({"allowPatterns": ["^echo "]});
        let guard = CommandGuard::new(&cfg);
        let decision = guard.evaluate(&event("ls -la")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert_eq!(decision.severity, radius_core::Severity::High);
    }
}
