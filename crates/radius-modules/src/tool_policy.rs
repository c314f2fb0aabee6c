//! 4.2.2 tool_policy — first-matching-rule tool allow/deny/challenge policy
//! with an optional argument schema.

use async_trait::async_trait;
use radius_core::{
    CanonicalEvent, ChallengeSpec, Channel, Decision, Module, ModuleError, ModuleMode, Phase,
    Severity,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::common::parse_mode;
use crate::structural::structural_match;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleAction {
    Allow,
    Deny,
    Challenge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

struct ArgConstraint {
    r#type: Option<ArgType>,
    pattern: Option<Regex>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    min: Option<f64>,
    max: Option<f64>,
    enum_values: Option<Vec<Value>>,
}

impl ArgConstraint {
    fn parse(v: &Value) -> Self {
        Self {
            r#type: v.get("type").and_then(Value::as_str).and_then(ArgType::parse),
            pattern: v
                .get("pattern")
                .and_then(Value::as_str)
                .and_then(|p| Regex::new(p).ok()),
            min_length: v.get("minLength").and_then(Value::as_u64),
            max_length: v.get("maxLength").and_then(Value::as_u64),
            min: v.get("min").and_then(Value::as_f64),
            max: v.get("max").and_then(Value::as_f64),
            enum_values: v.get("enum").and_then(Value::as_array).cloned(),
        }
    }

    /// Returns a precise failure reason, or `None` if the value satisfies
    /// every configured constraint.
    fn check(&self, field: &str, value: &Value) -> Option<String> {
        if let Some(t) = self.r#type {
            if !t.matches(value) {
                return Some(format!("argument \"{field}\" has wrong type"));
            }
        }
        if let Some(re) = &self.pattern {
            if let Some(s) = value.as_str() {
                if !re.is_match(s) {
                    return Some(format!("argument \"{field}\" does not match pattern"));
                }
            }
        }
        if let Some(s) = value.as_str() {
            let len = s.chars().count() as u64;
            if let Some(min_len) = self.min_length {
                if len < min_len {
                    return Some(format!("argument \"{field}\" is shorter than minLength"));
                }
            }
            if let Some(max_len) = self.max_length {
                if len > max_len {
                    return Some(format!("argument \"{field}\" is longer than maxLength"));
                }
            }
        }
        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Some(format!("argument \"{field}\" is below min"));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Some(format!("argument \"{field}\" is above max"));
                }
            }
        }
        if let Some(values) = &self.enum_values {
            if !values.contains(value) {
                return Some(format!("argument \"{field}\" is not one of the allowed values"));
            }
        }
        None
    }
}

struct Schema {
    required_args: Vec<String>,
    allowed_args: Vec<String>,
    forbid_unknown_args: bool,
    constraints: HashMap<String, ArgConstraint>,
}

impl Schema {
    fn parse(v: &Value) -> Self {
        let required_args: Vec<String> = v
            .get("requiredArgs")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let allowed_args: Vec<String> = v
            .get("allowedArgs")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let forbid_unknown_args = v.get("forbidUnknownArgs").and_then(Value::as_bool).unwrap_or(false);
        let constraints: HashMap<String, ArgConstraint> = v
            .get("argConstraints")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, cv)| (k.clone(), ArgConstraint::parse(cv))).collect())
            .unwrap_or_default();
        Self {
            required_args,
            allowed_args,
            forbid_unknown_args,
            constraints,
        }
    }

    /// Effective allowlist: `allowedArgs` when configured; otherwise, when
    /// `forbidUnknownArgs`, the union of required args and constraint keys.
    fn effective_allowed(&self) -> Option<HashSet<String>> {
        if !self.allowed_args.is_empty() {
            return Some(self.allowed_args.iter().cloned().collect());
        }
        if self.forbid_unknown_args {
            let mut set: HashSet<String> = self.required_args.iter().cloned().collect();
            set.extend(self.constraints.keys().cloned());
            return Some(set);
        }
        None
    }

    fn check(&self, args: &Map<String, Value>) -> Option<String> {
        for req in &self.required_args {
            if !args.contains_key(req) {
                return Some(format!("missing required argument \"{req}\""));
            }
        }
        if let Some(allowed) = self.effective_allowed() {
            for key in args.keys() {
                if !allowed.contains(key) {
                    return Some(format!("argument \"{key}\" is not allowlisted"));
                }
            }
        }
        for (field, constraint) in &self.constraints {
            if let Some(value) = args.get(field) {
                if let Some(reason) = constraint.check(field, value) {
                    return Some(reason);
                }
            }
        }
        None
    }
}

struct Rule {
    tool: String,
    when: Option<Value>,
    schema: Option<Schema>,
    action: RuleAction,
    channel: Option<Channel>,
    prompt: Option<String>,
    timeout_seconds: u64,
    message: Option<String>,
}

fn channel_from_str(s: &str) -> Option<Channel> {
    match s {
        "orchestrator" => Some(Channel::Orchestrator),
        "telegram" => Some(Channel::Telegram),
        "discord" => Some(Channel::Discord),
        "http" => Some(Channel::Http),
        _ => None,
    }
}

impl Rule {
    fn parse(v: &Value) -> Option<Self> {
        let tool = v.get("tool").and_then(Value::as_str)?.to_string();
        let action = match v.get("action").and_then(Value::as_str)? {
            "allow" => RuleAction::Allow,
            "deny" => RuleAction::Deny,
            "challenge" => RuleAction::Challenge,
            _ => return None,
        };
        Some(Self {
            tool,
            when: v.get("when").cloned(),
            schema: v.get("schema").map(Schema::parse),
            action,
            channel: v.get("channel").and_then(Value::as_str).and_then(channel_from_str),
            prompt: v.get("prompt").and_then(Value::as_str).map(str::to_string),
            timeout_seconds: v.get("timeoutSeconds").and_then(Value::as_u64).unwrap_or(300),
            message: v.get("message").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn matches(&self, tool_name: &str, args: &Map<String, Value>) -> bool {
        if self.tool != "*" && self.tool != tool_name {
            return false;
        }
        match &self.when {
            Some(when) => structural_match(when, &Value::Object(args.clone())),
            None => true,
        }
    }
}

pub struct ToolPolicy {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    rules: Vec<Rule>,
    default_allow: bool,
}

impl ToolPolicy {
    pub fn new(cfg: &Value) -> Self {
        let rules = cfg
            .get("rules")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Rule::parse).collect())
            .unwrap_or_default();
        let default_allow = matches!(cfg.get("default").and_then(Value::as_str), Some("allow"));
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            rules,
            default_allow,
        }
    }
}

#[async_trait]
impl Module for ToolPolicy {
    fn name(&self) -> &str {
        "tool_policy"
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
        for rule in &self.rules {
            if !rule.matches(&call.name, &call.arguments) {
                continue;
            }
            if let Some(schema) = &rule.schema {
                if let Some(reason) = schema.check(&call.arguments) {
                    return Ok(Decision::deny(self.name(), reason, Severity::High));
                }
            }
            return Ok(match rule.action {
                RuleAction::Allow => {
                    Decision::allow(self.name(), rule.message.clone().unwrap_or_else(|| "allowed by rule".to_string()))
                }
                RuleAction::Deny => Decision::deny(
                    self.name(),
                    rule.message.clone().unwrap_or_else(|| "denied by rule".to_string()),
                    Severity::High,
                ),
                RuleAction::Challenge => Decision::challenge(
                    self.name(),
                    rule.message.clone().unwrap_or_else(|| "approval required".to_string()),
                    ChallengeSpec {
                        channel: rule.channel.unwrap_or(Channel::Orchestrator),
                        prompt: rule
                            .prompt
                            .clone()
                            .unwrap_or_else(|| format!("Approve execution of \"{}\"?", call.name)),
                        timeout_seconds: rule.timeout_seconds,
                    },
                ),
            });
        }
        if self.default_allow {
            Ok(Decision::allow(self.name(), "no applicable rule; default allow"))
        } else {
            Ok(Decision::deny(
                self.name(),
                "no applicable rule; default deny",
                Severity::High,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    fn event_with_call(name: &str, args: Value) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        e.tool_call = Some(ToolCall {
            name: name.to_string(),
            arguments: args.as_object().cloned().unwrap_or_default(),
            raw: None,
        });
        e
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let cfg = json!({
            "rules": [
                {"tool": "Bash", "action": "deny"},
                {"tool": "*", "action": "allow"},
            ]
        });
        let module = ToolPolicy::new(&cfg);
        let decision = module.evaluate(&event_with_call("Bash", json!({}))).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn required_args_enforced() {
        let cfg = json!({
            "rules": [
                {"tool": "Bash", "action": "allow", "schema": {"requiredArgs": ["command"]}},
            ],
            "default": "allow"
        });
        let module = ToolPolicy::new(&cfg);
        let decision = module.evaluate(&event_with_call("Bash", json!({}))).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert!(decision.reason.contains("command"));
    }

    #[tokio::test]
    async fn unknown_args_denied_when_not_allowlisted() {
        let cfg = json!({
            "rules": [
                {"tool": "Bash", "action": "allow", "schema": {"allowedArgs": ["command"]}},
            ]
        });
        let module = ToolPolicy::new(&cfg);
        let decision = module
            .evaluate(&event_with_call("Bash", json!({"command": "ls", "extra": 1})))
            .await
            .unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert!(decision.reason.contains("not allowlisted"));
    }

    #[tokio::test]
    async fn default_deny_with_no_rules() {
        let module = ToolPolicy::new(&json!({}));
        let decision = module.evaluate(&event_with_call("Bash", json!({}))).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }
}
