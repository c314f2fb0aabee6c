//! HTTP bridge connector (spec §4.3, §6): POST a challenge to a fixed URL,
//! optionally follow a polling branch, and normalize the response status.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, ChallengeSpec};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::connector::Connector;
use crate::outcome::ApprovalOutcome;

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Approved,
    ApprovedTemporary,
    Pending,
    Denied,
    Timeout,
    Error,
}

fn normalize_status(raw: &str) -> Option<Status> {
    match raw {
        "approved" | "allow" | "allowed" | "approve" => Some(Status::Approved),
        "approved_temporary" | "temp_approved" | "temporary_approved" | "approve_temp" => {
            Some(Status::ApprovedTemporary)
        }
        "pending" | "wait" => Some(Status::Pending),
        "denied" | "deny" | "block" | "blocked" => Some(Status::Denied),
        "timeout" | "timed_out" => Some(Status::Timeout),
        "error" | "failed" => Some(Status::Error),
        _ => None,
    }
}

/// POSTs `{approvalId, prompt, timeoutSec, event}` to a fixed URL.
pub struct HttpBridgeConnector {
    url: String,
    headers: HashMap<String, String>,
    connector_timeout: Duration,
    client: reqwest::Client,
}

impl HttpBridgeConnector {
    pub fn new(url: String, headers: HashMap<String, String>, connector_timeout: Duration) -> Self {
        Self { url, headers, connector_timeout, client: reqwest::Client::new() }
    }

    fn effective_timeout(&self, challenge: &ChallengeSpec) -> Duration {
        self.connector_timeout.min(Duration::from_secs(challenge.timeout_seconds))
    }

    async fn post_with_headers(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value, String> {
        let mut req = self.client.post(url).timeout(timeout).json(body);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(map_reqwest_err)?;
        resp.json().await.map_err(map_reqwest_err)
    }

    async fn get_poll(&self, url: &str, timeout: Duration) -> Result<Value, String> {
        self.client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?
            .json()
            .await
            .map_err(map_reqwest_err)
    }
}

fn map_reqwest_err(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "AbortError".to_string()
    } else {
        e.to_string()
    }
}

fn outcome_from_body(body: &Value) -> ApprovalOutcome {
    let Some(status_raw) = body.get("status").and_then(Value::as_str) else {
        return ApprovalOutcome::Error { reason: "missing status".to_string() };
    };
    match normalize_status(status_raw) {
        Some(Status::Approved) => ApprovalOutcome::Approved,
        Some(Status::ApprovedTemporary) => ApprovalOutcome::ApprovedTemporary {
            ttl_sec: body.get("ttlSec").and_then(Value::as_u64),
        },
        Some(Status::Denied) => ApprovalOutcome::Denied {
            reason: body.get("reason").and_then(Value::as_str).map(str::to_string),
        },
        Some(Status::Timeout) => ApprovalOutcome::Timeout,
        Some(Status::Error) | None => ApprovalOutcome::Error {
            reason: body.get("reason").and_then(Value::as_str).unwrap_or(status_raw).to_string(),
        },
        Some(Status::Pending) => ApprovalOutcome::Error { reason: "pending without pollUrl".to_string() },
    }
}

#[async_trait]
impl Connector for HttpBridgeConnector {
    fn name(&self) -> &str {
        "http"
    }

    async fn resolve(&self, approval_id: &str, challenge: &ChallengeSpec, event: &CanonicalEvent) -> ApprovalOutcome {
        let timeout = self.effective_timeout(challenge);
        let deadline = Instant::now() + timeout;
        let body = json!({
            "approvalId": approval_id,
            "prompt": challenge.prompt,
            "timeoutSec": challenge.timeout_seconds,
            "event": event,
        });

        let first = match self.post_with_headers(&self.url, &body, timeout).await {
            Ok(v) => v,
            Err(e) if e == "AbortError" => return ApprovalOutcome::Timeout,
            Err(e) => return ApprovalOutcome::Error { reason: e },
        };

        let Some(status_raw) = first.get("status").and_then(Value::as_str) else {
            return ApprovalOutcome::Error { reason: "missing status".to_string() };
        };

        if normalize_status(status_raw) != Some(Status::Pending) {
            return outcome_from_body(&first);
        }

        let Some(poll_url) = first.get("pollUrl").and_then(Value::as_str) else {
            return ApprovalOutcome::Error { reason: "pending without pollUrl".to_string() };
        };
        let retry_after = Duration::from_millis(first.get("retryAfterMs").and_then(Value::as_u64).unwrap_or(1000));

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ApprovalOutcome::Timeout;
            }
            tokio::time::sleep(retry_after.min(remaining)).await;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ApprovalOutcome::Timeout;
            }
            match self.get_poll(poll_url, remaining).await {
                Ok(body) => {
                    let status = body.get("status").and_then(Value::as_str);
                    if status == Some("pending") || status == Some("wait") {
                        continue;
                    }
                    return outcome_from_body(&body);
                }
                Err(e) if e == "AbortError" => return ApprovalOutcome::Timeout,
                Err(e) => return ApprovalOutcome::Error { reason: e },
            }
        }
    }
}
