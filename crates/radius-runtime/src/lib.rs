//! The runtime facade: the single entry point an embedding host calls once
//! per event. Wires the configuration resolver, the module registry, the
//! pipeline executor, the approval resolver, the adapter layer, the audit
//! recorder, and any decision observers together — a frozen, once-built
//! service struct with a per-call handler, not a framework.

pub mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use radius_adapters::adapter_for;
use radius_approval::{resolve_and_fold, ChatConnector, Connector, FallbackPolicy, HttpBridgeConnector, ResolverConfig};
use radius_audit::Recorder;
use radius_config::{Config, DefaultAction};
use radius_core::clock::{Clock, SystemClock};
use radius_core::{Action, AuditSink, CanonicalEvent, Channel, Decision, Framework, Module, PipelineResult, Severity};
use radius_modules::{build_modules, RegistryContext};
use radius_state::{InMemoryStore, SqliteStore, Store};
use radius_telemetry::DecisionObserver;
use serde_json::Value;
use tracing::instrument;

pub use error::RuntimeError;

fn build_store(store_cfg: &Value) -> Result<Arc<dyn Store>, RuntimeError> {
    match store_cfg.get("backend").and_then(Value::as_str) {
        Some("sqlite") => {
            let path = store_cfg
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("./.radius/state.db");
            Ok(Arc::new(SqliteStore::open(path)?))
        }
        _ => Ok(Arc::new(InMemoryStore::new())),
    }
}

fn fallback_policy(approval_cfg: &Value, key: &str) -> FallbackPolicy {
    match approval_cfg.get(key).and_then(Value::as_str) {
        Some("alert") => FallbackPolicy::Alert,
        _ => FallbackPolicy::Deny,
    }
}

fn resolver_config(approval_cfg: &Value) -> ResolverConfig {
    let max_ttl = approval_cfg
        .get("maxLeaseTtlSec")
        .and_then(Value::as_u64)
        .unwrap_or(3_600);
    ResolverConfig {
        mode: approval_cfg
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("sync_wait")
            .to_string(),
        on_timeout: fallback_policy(approval_cfg, "onTimeout"),
        on_connector_error: fallback_policy(approval_cfg, "onConnectorError"),
        default_lease_ttl_secs: max_ttl,
        max_lease_ttl_secs: max_ttl,
    }
}

/// Builds the connector matching a challenge's channel from the `approval`
/// config section (spec §4.3, §6 wire shapes for `chat` and `http`).
fn build_connector(channel: Channel, approval_cfg: &Value) -> Result<Arc<dyn Connector>, RuntimeError> {
    match channel {
        Channel::Telegram | Channel::Discord => {
            let chat_cfg = approval_cfg.get("chat").cloned().unwrap_or(Value::Null);
            let base_url = chat_cfg
                .get("baseUrl")
                .and_then(Value::as_str)
                .ok_or_else(|| RuntimeError::MissingConnectorConfig("approval.chat.baseUrl".to_string()))?
                .to_string();
            let chat_ids = chat_cfg
                .get("chatIds")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            let approver_ids = chat_cfg
                .get("approverIds")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            Ok(Arc::new(ChatConnector::new(base_url, chat_ids, approver_ids)))
        }
        Channel::Http => {
            let http_cfg = approval_cfg.get("http").cloned().unwrap_or(Value::Null);
            let url = http_cfg
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| RuntimeError::MissingConnectorConfig("approval.http.url".to_string()))?
                .to_string();
            let headers = http_cfg
                .get("headers")
                .and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            let timeout_sec = http_cfg.get("timeoutSec").and_then(Value::as_u64).unwrap_or(30);
            Ok(Arc::new(HttpBridgeConnector::new(url, headers, Duration::from_secs(timeout_sec))))
        }
        Channel::Orchestrator => Err(RuntimeError::UnsupportedChannel("orchestrator".to_string())),
    }
}

/// The frozen, once-built policy kernel. Configuration is loaded and
/// modules instantiated exactly once (spec §3 Lifecycle); `handle` is the
/// single entry point called per inbound event.
pub struct Runtime {
    config: Config,
    modules: Vec<Arc<dyn Module>>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    audit_sink: Arc<Recorder>,
    observers: Vec<Arc<dyn DecisionObserver>>,
}

impl Runtime {
    /// Load configuration from `path` (or the default candidate filenames)
    /// and build the runtime from it.
    pub fn from_config_path(path: Option<&Path>) -> Result<Self, RuntimeError> {
        let config = radius_config::load(path)?;
        Self::from_config(config)
    }

    /// Build the runtime from an already-resolved [`Config`].
    pub fn from_config(config: Config) -> Result<Self, RuntimeError> {
        let store = build_store(&config.store)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audit_sink = Arc::new(Recorder::from_config(&config.audit));
        let ctx = RegistryContext {
            store: store.clone(),
            clock: clock.clone(),
            audit_sink: audit_sink.clone() as Arc<dyn AuditSink>,
        };
        let modules = build_modules(&config.modules, &config.module_config, &ctx)?;
        Ok(Self {
            config,
            modules,
            store,
            clock,
            audit_sink,
            observers: Vec::new(),
        })
    }

    /// Register a decision observer (e.g. `LoggingObserver`, `MetricsObserver`).
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn default_action(&self) -> Action {
        match self.config.global.default_action {
            DefaultAction::Deny => Action::Deny,
            DefaultAction::Allow => Action::Allow,
        }
    }

    /// Runs one raw orchestrator payload through the full kernel: adapt to
    /// the canonical event, evaluate the pipeline, resolve any terminal
    /// challenge, audit the outcome, notify observers, and adapt the
    /// result back to the orchestrator's wire shape.
    #[instrument(skip(self, raw), fields(framework = ?framework))]
    pub async fn handle(&self, framework: Framework, raw: &Value) -> Value {
        let adapter = adapter_for(framework);
        let event = adapter.to_event(raw);
        self.audit_sink.record_event(&event);

        let mut result = radius_pipeline::run(&event, &self.modules, self.default_action()).await;

        if result.final_action == Action::Challenge {
            result = self.resolve_challenge(&event, result).await;
        }

        self.audit_sink.record_result(&event, &result);
        for observer in &self.observers {
            observer.on_decision(&event, &result);
        }

        adapter.to_response(&result, raw)
    }

    async fn resolve_challenge(&self, event: &CanonicalEvent, mut result: PipelineResult) -> PipelineResult {
        let Some(challenge) = result.decisions.iter().rev().find_map(|d| d.challenge.clone()) else {
            return result;
        };
        let channel_name = format!("{:?}", challenge.channel).to_lowercase();

        let connector = match build_connector(challenge.channel, &self.config.approval) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to build approval connector");
                let decision = Decision::deny(
                    "approval_resolver",
                    format!("connector unavailable: {e}"),
                    Severity::High,
                );
                result.final_action = decision.action;
                result.final_reason = decision.reason.clone();
                result.decisions.push(decision);
                return result;
            }
        };

        let resolver_cfg = resolver_config(&self.config.approval);
        let decision = resolve_and_fold(
            &channel_name,
            &challenge,
            event,
            connector.as_ref(),
            &resolver_cfg,
            &self.store,
            &self.clock,
        )
        .await;
        result.final_action = decision.action;
        result.final_reason = decision.reason.clone();
        result.decisions.push(decision);
        result
    }
}
