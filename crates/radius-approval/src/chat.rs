//! Chat connector (spec §4.3, §6): a Telegram-shaped bot API. Posts an
//! inline-keyboard prompt to every configured chat, then polls `getUpdates`
//! for a matching callback query until the challenge deadline.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, ChallengeSpec};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::connector::Connector;
use crate::outcome::ApprovalOutcome;

/// `https://<host>/<bot-identifier>/<method>` chat approval channel.
pub struct ChatConnector {
    /// e.g. `https://api.telegram.org/bot<token>`.
    base_url: String,
    chat_ids: Vec<i64>,
    approver_ids: HashSet<i64>,
    allowed_chat_ids: HashSet<i64>,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl ChatConnector {
    pub fn new(base_url: String, chat_ids: Vec<i64>, approver_ids: HashSet<i64>) -> Self {
        let allowed_chat_ids = chat_ids.iter().copied().collect();
        Self {
            base_url,
            chat_ids,
            approver_ids,
            allowed_chat_ids,
            poll_interval: Duration::from_secs(2),
            client: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn send_prompt(&self, approval_id: &str, prompt: &str) -> Result<(), String> {
        let keyboard = json!({
            "inline_keyboard": [[
                {"text": "Approve", "callback_data": format!("ag:approve:{approval_id}")},
                {"text": "Deny", "callback_data": format!("ag:deny:{approval_id}")},
            ]]
        });
        for chat_id in &self.chat_ids {
            let body = json!({"chat_id": chat_id, "text": prompt, "reply_markup": keyboard});
            self.client
                .post(self.method_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn poll_once(&self, offset: i64) -> Result<Vec<Value>, String> {
        let resp: Value = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset), ("timeout", 0)])
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;
        Ok(resp.get("result").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    async fn ack(&self, callback_query_id: &str) {
        let _ = self
            .client
            .post(self.method_url("answerCallbackQuery"))
            .json(&json!({"callback_query_id": callback_query_id}))
            .send()
            .await;
    }

    fn originator_allowed(&self, user_id: i64, chat_id: i64) -> bool {
        !self.approver_ids.is_empty()
            && self.approver_ids.contains(&user_id)
            && !self.allowed_chat_ids.is_empty()
            && self.allowed_chat_ids.contains(&chat_id)
    }
}

#[async_trait]
impl Connector for ChatConnector {
    fn name(&self) -> &str {
        "chat"
    }

    async fn resolve(&self, approval_id: &str, challenge: &ChallengeSpec, _event: &CanonicalEvent) -> ApprovalOutcome {
        if let Err(e) = self.send_prompt(approval_id, &challenge.prompt).await {
            return ApprovalOutcome::Error { reason: e };
        }

        let deadline = Instant::now() + Duration::from_secs(challenge.timeout_seconds);
        let mut offset: i64 = 0;

        while Instant::now() < deadline {
            let updates = match self.poll_once(offset).await {
                Ok(u) => u,
                Err(e) => return ApprovalOutcome::Error { reason: e },
            };

            for update in &updates {
                if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                    offset = offset.max(update_id + 1);
                }
                let Some(cbq) = update.get("callback_query") else { continue };
                let Some(data) = cbq.get("data").and_then(Value::as_str) else { continue };
                let Some(suffix) = data.strip_prefix("ag:") else { continue };
                let Some((verb, id)) = suffix.split_once(':') else { continue };
                if id != approval_id {
                    continue;
                }
                let user_id = cbq.get("from").and_then(|f| f.get("id")).and_then(Value::as_i64).unwrap_or(-1);
                let chat_id = cbq
                    .get("message")
                    .and_then(|m| m.get("chat"))
                    .and_then(|c| c.get("id"))
                    .and_then(Value::as_i64)
                    .unwrap_or(-1);
                if !self.originator_allowed(user_id, chat_id) {
                    continue;
                }
                if let Some(id) = cbq.get("id").and_then(Value::as_str) {
                    self.ack(id).await;
                }
                return match verb {
                    "approve" => ApprovalOutcome::Approved,
                    "deny" => ApprovalOutcome::Denied { reason: None },
                    _ => continue,
                };
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        ApprovalOutcome::Timeout
    }
}
