//! 4.2.14 verdict_provider — bridges to external HTTP verdict services,
//! normalizing several response shapes into one verdict.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::common::parse_mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnProviderError {
    Deny,
    Alert,
}

#[derive(Debug, Clone)]
struct Provider {
    name: String,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NormalizedAction {
    Allow,
    Deny,
    Alert,
}

#[derive(Debug, Clone)]
struct NormalizedVerdict {
    action: NormalizedAction,
    confidence: f64,
    category: Option<String>,
    provider: String,
}

fn normalize(raw: &Value, provider: &str) -> Option<NormalizedVerdict> {
    let verdict = raw.get("verdict").unwrap_or(raw);

    if let Some(action) = verdict.get("action").and_then(Value::as_str) {
        let action = match action {
            "deny" => NormalizedAction::Deny,
            "alert" => NormalizedAction::Alert,
            _ => NormalizedAction::Allow,
        };
        return Some(NormalizedVerdict {
            action,
            confidence: verdict.get("confidence").and_then(Value::as_f64).unwrap_or(1.0),
            category: verdict.get("category").and_then(Value::as_str).map(str::to_string),
            provider: provider.to_string(),
        });
    }

    if let Some(blocked) = verdict.get("blocked").and_then(Value::as_bool) {
        return Some(NormalizedVerdict {
            action: if blocked { NormalizedAction::Deny } else { NormalizedAction::Allow },
            confidence: verdict.get("confidence").and_then(Value::as_f64).unwrap_or(1.0),
            category: None,
            provider: provider.to_string(),
        });
    }

    None
}

fn call_body(event: &CanonicalEvent) -> Option<Value> {
    match event.phase {
        Phase::PreRequest => event.request_text.as_ref().map(|t| json!({"text": t})),
        Phase::PreResponse => event.response_text.as_ref().map(|t| json!({"text": t})),
        Phase::PreTool => event.tool_call.as_ref().map(|c| {
            json!({"tool": c.name, "arguments": c.arguments})
        }),
        _ => None,
    }
}

pub struct VerdictProvider {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    providers: Vec<Provider>,
    min_confidence: f64,
    on_provider_error: OnProviderError,
    client: reqwest::Client,
}

impl VerdictProvider {
    pub fn new(cfg: &Value) -> Self {
        let providers = cfg
            .get("providers")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| {
                        let url = p.get("url").and_then(Value::as_str)?.to_string();
                        let name = p.get("name").and_then(Value::as_str).unwrap_or(&url).to_string();
                        let timeout_ms = p.get("timeoutMs").and_then(Value::as_u64).unwrap_or(3_000);
                        Some(Provider { name, url, timeout: Duration::from_millis(timeout_ms) })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreRequest, Phase::PreTool, Phase::PreResponse].into_iter().collect(),
            providers,
            min_confidence: cfg.get("minConfidence").and_then(Value::as_f64).unwrap_or(0.5),
            on_provider_error: match cfg.get("onProviderError").and_then(Value::as_str) {
                Some("deny") => OnProviderError::Deny,
                _ => OnProviderError::Alert,
            },
            client: reqwest::Client::new(),
        }
    }

    async fn query(&self, provider: &Provider, body: &Value) -> Result<NormalizedVerdict, String> {
        let response = self
            .client
            .post(&provider.url)
            .timeout(provider.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let raw: Value = response.json().await.map_err(|e| e.to_string())?;
        normalize(&raw, &provider.name).ok_or_else(|| "unrecognized verdict shape".to_string())
    }
}

#[async_trait]
impl Module for VerdictProvider {
    fn name(&self) -> &str {
        "verdict_provider"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        if self.providers.is_empty() {
            return Ok(Decision::allow(self.name(), "no providers configured"));
        }
        let Some(body) = call_body(event) else {
            return Ok(Decision::allow(self.name(), "no content for this phase"));
        };

        let mut findings = Vec::new();
        let mut errors = Vec::new();
        for provider in &self.providers {
            match self.query(provider, &body).await {
                Ok(verdict) => {
                    if verdict.action == NormalizedAction::Deny && verdict.confidence >= self.min_confidence {
                        return Ok(Decision::deny(
                            self.name(),
                            format!(
                                "provider \"{}\" denied (confidence {:.2}{})",
                                verdict.provider,
                                verdict.confidence,
                                verdict.category.as_deref().map(|c| format!(", category {c}")).unwrap_or_default()
                            ),
                            Severity::High,
                        ));
                    }
                    findings.push(verdict);
                }
                Err(e) => errors.push((provider.name.clone(), e)),
            }
        }

        if !errors.is_empty() {
            let summary = errors.iter().map(|(n, e)| format!("{n}: {e}")).collect::<Vec<_>>().join("; ");
            return Ok(match self.on_provider_error {
                OnProviderError::Deny => Decision::deny(self.name(), format!("provider error: {summary}"), Severity::High),
                OnProviderError::Alert => Decision::alert(self.name(), format!("provider error: {summary}"), Severity::Medium),
            });
        }

        if findings.iter().any(|f| f.action != NormalizedAction::Allow) {
            return Ok(Decision::alert(self.name(), "provider findings below deny threshold", Severity::Medium));
        }

        Ok(Decision::allow(self.name(), "all providers allowed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_action_confidence_category_shape() {
        let raw = json!({"action": "deny", "confidence": 0.9, "category": "malware"});
        let v = normalize(&raw, "p1").unwrap();
        assert_eq!(v.action, NormalizedAction::Deny);
        assert_eq!(v.category.as_deref(), Some("malware"));
    }

    #[test]
    fn normalize_handles_blocked_confidence_shape() {
        let raw = json!({"blocked": true, "confidence": 0.7});
        let v = normalize(&raw, "p1").unwrap();
        assert_eq!(v.action, NormalizedAction::Deny);
    }

    #[test]
    fn normalize_handles_nested_verdict_form() {
        let raw = json!({"verdict": {"action": "allow", "confidence": 1.0}});
        let v = normalize(&raw, "p1").unwrap();
        assert_eq!(v.action, NormalizedAction::Allow);
    }

    #[tokio::test]
    async fn no_providers_allows() {
        let provider = VerdictProvider::new(&json!({}));
        let e = CanonicalEvent::new(Phase::PreRequest, radius_core::Framework::Generic);
        let decision = provider.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }
}
