//! Chat-style (claude-telegram) adapter (spec §4.5, §6).

use radius_core::{Action, CanonicalEvent, Framework, Phase, PipelineResult};
use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::common::{set_metadata_str, set_metadata_value, stringify_id};

/// `hook ∈ {beforeClaude, afterClaude}`, `ctx.{chatId, userId, agentName, profile, labels}`.
pub struct ClaudeTelegramAdapter;

impl Adapter for ClaudeTelegramAdapter {
    fn to_event(&self, raw: &Value) -> CanonicalEvent {
        let hook = raw.get("hook").and_then(Value::as_str).unwrap_or("beforeClaude");
        let phase = if hook == "afterClaude" { Phase::PreResponse } else { Phase::PreRequest };
        let mut event = CanonicalEvent::new(phase, Framework::ClaudeTelegram);

        let ctx = raw.get("ctx");
        event.session =
            stringify_id(ctx.and_then(|c| c.get("chatId"))).unwrap_or_else(|| "unknown".to_string());
        event.user = stringify_id(ctx.and_then(|c| c.get("userId")));
        event.agent = ctx.and_then(|c| c.get("agentName")).and_then(Value::as_str).map(str::to_string);

        if phase == Phase::PreResponse {
            event.response_text = raw.get("result").and_then(Value::as_str).map(str::to_string);
        } else {
            event.request_text = raw.get("message").and_then(Value::as_str).map(str::to_string);
        }

        set_metadata_str(&mut event.metadata, "channel", Some("telegram"));
        set_metadata_str(&mut event.metadata, "modeHint", ctx.and_then(|c| c.get("profile")).and_then(Value::as_str));
        set_metadata_value(&mut event.metadata, "routeTags", ctx.and_then(|c| c.get("labels")).cloned());

        event
    }

    fn to_response(&self, result: &PipelineResult, _raw: &Value) -> Value {
        match result.final_action {
            Action::Deny => json!({"allow": false, "reason": result.final_reason}),
            Action::Challenge => {
                let challenge = result.decisions.iter().rev().find_map(|d| d.challenge.clone());
                json!({
                    "allow": false,
                    "reason": result.final_reason,
                    "challenge": challenge.map(|c| json!({
                        "prompt": c.prompt,
                        "timeoutSeconds": c.timeout_seconds,
                    })),
                })
            }
            _ => json!({
                "allow": true,
                "message": result.transforms.response_text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn before_claude_maps_to_pre_request_with_message() {
        let raw = json!({
            "hook": "beforeClaude",
            "ctx": {"chatId": 42, "userId": 7, "agentName": "agent-a", "profile": "standard"},
            "message": "do the thing",
        });
        let event = ClaudeTelegramAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PreRequest);
        assert_eq!(event.session, "42");
        assert_eq!(event.request_text.as_deref(), Some("do the thing"));
        assert_eq!(event.metadata.get("modeHint").and_then(Value::as_str), Some("standard"));
    }

    #[test]
    fn after_claude_maps_to_pre_response_with_result() {
        let raw = json!({"hook": "afterClaude", "ctx": {"chatId": "c1"}, "result": "done"});
        let event = ClaudeTelegramAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PreResponse);
        assert_eq!(event.response_text.as_deref(), Some("done"));
    }

    #[test]
    fn missing_ctx_falls_back_to_unknown_session() {
        let event = ClaudeTelegramAdapter.to_event(&json!({}));
        assert_eq!(event.session, "unknown");
    }
}
