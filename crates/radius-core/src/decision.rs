//! Decision variants and the accumulated Pipeline Result (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A module's verdict on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
    Modify,
    Challenge,
    Alert,
}

/// Severity attached to a decision, used by audit and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

/// Channel a challenge should be routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Orchestrator,
    Telegram,
    Discord,
    Http,
}

/// A request for human approval carried by a `challenge` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSpec {
    pub channel: Channel,
    pub prompt: String,
    pub timeout_seconds: u64,
}

/// A set of field-level overwrites a `modify` decision contributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

/// One module's output for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub module: String,
    pub reason: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeSpec>,
}

impl Decision {
    pub fn allow(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Allow,
            module: module.into(),
            reason: reason.into(),
            severity: Severity::Info,
            patch: None,
            challenge: None,
        }
    }

    pub fn deny(
        module: impl Into<String>,
        reason: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            action: Action::Deny,
            module: module.into(),
            reason: reason.into(),
            severity,
            patch: None,
            challenge: None,
        }
    }

    pub fn alert(
        module: impl Into<String>,
        reason: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            action: Action::Alert,
            module: module.into(),
            reason: reason.into(),
            severity,
            patch: None,
            challenge: None,
        }
    }

    pub fn modify(module: impl Into<String>, reason: impl Into<String>, patch: Patch) -> Self {
        Self {
            action: Action::Modify,
            module: module.into(),
            reason: reason.into(),
            severity: Severity::Info,
            patch: Some(patch),
            challenge: None,
        }
    }

    pub fn challenge(
        module: impl Into<String>,
        reason: impl Into<String>,
        challenge: ChallengeSpec,
    ) -> Self {
        Self {
            action: Action::Challenge,
            module: module.into(),
            reason: reason.into(),
            severity: Severity::Medium,
            patch: None,
            challenge: Some(challenge),
        }
    }
}

/// Accumulated transforms composed from every `modify` decision in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transforms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

/// The final output of a full pipeline run over one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub final_action: Action,
    pub final_reason: String,
    pub transforms: Transforms,
    /// Chronological alert lines, e.g. `"[module] reason"`.
    pub alerts: Vec<String>,
    /// Every decision recorded in invocation order (§3 invariants i-iii).
    pub decisions: Vec<Decision>,
}

impl PipelineResult {
    pub fn default_action(action: Action, reason: impl Into<String>) -> Self {
        Self {
            final_action: action,
            final_reason: reason.into(),
            transforms: Transforms::default(),
            alerts: Vec::new(),
            decisions: Vec::new(),
        }
    }
}
