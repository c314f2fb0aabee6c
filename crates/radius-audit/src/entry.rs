//! The JSON line shape every sink receives (spec §4.2.15).

use radius_core::{Artifact, CanonicalEvent, Decision, Framework, Phase, PipelineResult};
use serde::Serialize;
use serde_json::Value;

const RESULT_SUMMARY_MAX_LEN: usize = 2_000;

/// Whether this line records an event arriving or a pipeline result completing.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Event,
    Result,
}

/// One audited line: an event observation, or the pipeline result that
/// followed it.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub kind: EntryKind,
    pub timestamp: String,
    pub phase: Phase,
    pub framework: Framework,
    pub session: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<Decision>>,
}

fn truncate(s: &str) -> String {
    if s.len() <= RESULT_SUMMARY_MAX_LEN {
        s.to_string()
    } else {
        format!("{}...", &s[..RESULT_SUMMARY_MAX_LEN])
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl AuditEntry {
    /// Build the per-event line, recorded before the pipeline result is known.
    /// `include_arguments`/`include_results` gate the matching §6 schema fields.
    pub fn for_event(event: &CanonicalEvent, include_arguments: bool, include_results: bool) -> Self {
        Self {
            kind: EntryKind::Event,
            timestamp: now_iso8601(),
            phase: event.phase,
            framework: event.framework,
            session: event.session.clone(),
            user: event.user.clone(),
            agent: event.agent.clone(),
            tool_name: event.tool_call.as_ref().map(|c| c.name.clone()),
            arguments: if include_arguments {
                event.tool_call.as_ref().map(|c| Value::Object(c.arguments.clone()))
            } else {
                None
            },
            result_summary: if include_results {
                event.tool_result.as_ref().and_then(|r| r.text.as_deref()).map(truncate)
            } else {
                None
            },
            artifact: event.artifact.clone(),
            decisions: None,
        }
    }

    /// Build the per-result line, recorded once the pipeline has terminated.
    pub fn for_result(event: &CanonicalEvent, result: &PipelineResult) -> Self {
        Self {
            kind: EntryKind::Result,
            timestamp: now_iso8601(),
            phase: event.phase,
            framework: event.framework,
            session: event.session.clone(),
            user: event.user.clone(),
            agent: event.agent.clone(),
            tool_name: event.tool_call.as_ref().map(|c| c.name.clone()),
            arguments: None,
            result_summary: Some(result.final_reason.clone()),
            artifact: event.artifact.clone(),
            decisions: Some(result.decisions.clone()),
        }
    }
}
