//! MCP-style (nanobot) adapter (spec §4.5, §6).

use radius_core::{Action, CanonicalEvent, Framework, Phase, PipelineResult, ToolCall, ToolResult};
use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::common::{set_metadata_str, set_metadata_value, stringify_id};

/// `direction`, `method` (tools/call), `params.{name,arguments,agent}`,
/// `result.content[].text`, `result.isError`.
pub struct NanobotAdapter;

impl Adapter for NanobotAdapter {
    fn to_event(&self, raw: &Value) -> CanonicalEvent {
        let direction = raw.get("direction").and_then(Value::as_str).unwrap_or("request");
        let phase = if direction == "response" { Phase::PostTool } else { Phase::PreTool };
        let mut event = CanonicalEvent::new(phase, Framework::Nanobot);

        let params = raw.get("params");
        event.session = stringify_id(raw.get("session_id").or_else(|| raw.get("sessionId")))
            .unwrap_or_else(|| "unknown".to_string());
        event.agent = params.and_then(|p| p.get("agent")).and_then(Value::as_str).map(str::to_string);

        if let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) {
            let arguments = params
                .and_then(|p| p.get("arguments"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            event.tool_call = Some(ToolCall { name: name.to_string(), arguments, raw: Some(raw.clone()) });
        }

        if let Some(result) = raw.get("result") {
            let text = result
                .get("content")
                .and_then(Value::as_array)
                .and_then(|items| items.iter().find_map(|c| c.get("text").and_then(Value::as_str)))
                .map(str::to_string);
            let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
            event.tool_result = Some(ToolResult { text, is_error, raw: Some(result.clone()) });
        }

        set_metadata_str(&mut event.metadata, "channel", raw.get("channel").and_then(Value::as_str));
        set_metadata_str(&mut event.metadata, "modeHint", params.and_then(|p| p.get("mode")).and_then(Value::as_str));
        set_metadata_str(&mut event.metadata, "taskType", params.and_then(|p| p.get("taskType")).and_then(Value::as_str));
        set_metadata_value(&mut event.metadata, "routeTags", raw.get("tags").cloned());

        event
    }

    fn to_response(&self, result: &PipelineResult, _raw: &Value) -> Value {
        match result.final_action {
            Action::Deny => json!({"accept": false, "reason": result.final_reason}),
            Action::Challenge => {
                let challenge = result.decisions.iter().rev().find_map(|d| d.challenge.clone());
                json!({
                    "accept": false,
                    "reason": result.final_reason,
                    "challenge": challenge.map(|c| json!({
                        "prompt": c.prompt,
                        "timeoutSeconds": c.timeout_seconds,
                        "channel": c.channel,
                    })),
                })
            }
            _ => json!({
                "accept": true,
                "message": result.transforms.tool_arguments,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_direction_maps_to_pre_tool() {
        let raw = json!({
            "direction": "request",
            "method": "tools/call",
            "params": {"name": "Bash", "arguments": {"command": "ls"}, "agent": "agent-a"},
            "session_id": "s1",
        });
        let event = NanobotAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PreTool);
        assert_eq!(event.tool_call.unwrap().name, "Bash");
        assert_eq!(event.agent.as_deref(), Some("agent-a"));
    }

    #[test]
    fn response_direction_carries_result_text_and_error_flag() {
        let raw = json!({
            "direction": "response",
            "result": {"content": [{"text": "done"}], "isError": true},
        });
        let event = NanobotAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PostTool);
        let result = event.tool_result.unwrap();
        assert_eq!(result.text.as_deref(), Some("done"));
        assert!(result.is_error);
    }

    #[test]
    fn missing_params_falls_back_safely() {
        let event = NanobotAdapter.to_event(&json!({}));
        assert_eq!(event.session, "unknown");
        assert!(event.tool_call.is_none());
    }
}
