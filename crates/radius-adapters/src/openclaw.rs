//! OpenClaw-style adapter (spec §4.5, §6).

use radius_core::{Action, CanonicalEvent, Framework, Phase, PipelineResult, ToolCall, ToolResult};
use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::common::{set_metadata_str, set_metadata_value};

/// `hook_type`/`hook_event_name`, `tool_name`, `tool_input`/`tool_arguments`.
pub struct OpenClawAdapter;

fn phase_from_hook(raw: &Value) -> Phase {
    let hook = raw
        .get("hook_type")
        .or_else(|| raw.get("hook_event_name"))
        .and_then(Value::as_str);
    match hook {
        Some("PreToolUse") => Phase::PreTool,
        Some("PostToolUse") => Phase::PostTool,
        _ => Phase::PreRequest,
    }
}

impl Adapter for OpenClawAdapter {
    fn to_event(&self, raw: &Value) -> CanonicalEvent {
        let phase = phase_from_hook(raw);
        let mut event = CanonicalEvent::new(phase, Framework::Openclaw);
        event.session = raw
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        event.agent = raw.get("agent_name").and_then(Value::as_str).map(str::to_string);

        if let Some(name) = raw.get("tool_name").and_then(Value::as_str) {
            let arguments = raw
                .get("tool_input")
                .or_else(|| raw.get("tool_arguments"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            event.tool_call = Some(ToolCall { name: name.to_string(), arguments, raw: Some(raw.clone()) });
        }

        if phase == Phase::PostTool {
            let text = raw
                .get("tool_output")
                .or_else(|| raw.get("tool_response"))
                .or_else(|| raw.get("tool_result"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let is_error = raw.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            event.tool_result = Some(ToolResult { text, is_error, raw: Some(raw.clone()) });
        }

        set_metadata_str(&mut event.metadata, "channel", raw.get("channel").and_then(Value::as_str));
        set_metadata_str(&mut event.metadata, "modeHint", raw.get("mode").and_then(Value::as_str));
        set_metadata_str(&mut event.metadata, "taskType", raw.get("task_type").and_then(Value::as_str));
        set_metadata_value(&mut event.metadata, "routeTags", raw.get("tags").cloned());

        event
    }

    fn to_response(&self, result: &PipelineResult, _raw: &Value) -> Value {
        match result.final_action {
            Action::Deny => json!({"decision": "deny", "reason": result.final_reason}),
            Action::Challenge => {
                let challenge = result.decisions.iter().rev().find_map(|d| d.challenge.clone());
                json!({
                    "decision": "challenge",
                    "reason": result.final_reason,
                    "challenge": challenge.map(|c| json!({
                        "prompt": c.prompt,
                        "timeoutSeconds": c.timeout_seconds,
                        "channel": c.channel,
                    })),
                })
            }
            _ => json!({
                "decision": "allow",
                "updatedInput": result.transforms.tool_arguments,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_tool_use_maps_to_pre_tool_phase_with_arguments() {
        let raw = json!({
            "hook_type": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"},
            "session_id": "s1",
            "agent_name": "agent-a",
        });
        let event = OpenClawAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PreTool);
        assert_eq!(event.session, "s1");
        assert_eq!(event.tool_call.unwrap().name, "Bash");
    }

    #[test]
    fn malformed_input_falls_back_to_safe_defaults() {
        let raw = json!({});
        let event = OpenClawAdapter.to_event(&raw);
        assert_eq!(event.session, "unknown");
        assert!(event.tool_call.is_none());
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn deny_maps_to_block_form() {
        let result = PipelineResult::default_action(Action::Deny, "blocked by command_guard");
        let response = OpenClawAdapter.to_response(&result, &json!({}));
        assert_eq!(response["decision"], "deny");
    }
}
