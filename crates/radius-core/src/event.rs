//! The canonical event model (spec §3): the framework-independent projection
//! every adapter produces and every module consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle point at which a policy evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreLoad,
    PreRequest,
    PreTool,
    PostTool,
    PreResponse,
}

impl Phase {
    /// All five phases, in the canonical order modules are filtered against.
    pub const ALL: [Phase; 5] = [
        Phase::PreLoad,
        Phase::PreRequest,
        Phase::PreTool,
        Phase::PostTool,
        Phase::PreResponse,
    ];
}

/// Orchestrator dialect an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Openclaw,
    Nanobot,
    ClaudeTelegram,
    Generic,
}

/// A tool invocation about to run (`pre_tool`) or already observed (`post_tool`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// The observed result of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Kind of artifact an agent is about to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Skill,
    Prompt,
    ToolMetadata,
    Config,
}

/// Supply-chain metadata for an artifact about to be installed or loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub signature_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbom_uri: Option<String>,
    #[serde(default)]
    pub version_pinned: bool,
}

/// Immutable, framework-independent record every module evaluates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub phase: Phase,
    pub framework: Framework,
    /// Required; defaults to `"unknown"` when the adapter can't determine it.
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CanonicalEvent {
    /// A minimal event with every optional field empty, for the default
    /// session `"unknown"` and the given phase/framework.
    pub fn new(phase: Phase, framework: Framework) -> Self {
        Self {
            phase,
            framework,
            session: "unknown".to_string(),
            agent: None,
            user: None,
            request_text: None,
            tool_call: None,
            tool_result: None,
            response_text: None,
            artifact: None,
            metadata: Map::new(),
        }
    }

    /// Convenience accessor used by modules that read a single metadata
    /// string value (e.g. a routing hint).
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_defaults_session_to_unknown() {
        let e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        assert_eq!(e.session, "unknown");
        assert!(e.tool_call.is_none());
    }
}
