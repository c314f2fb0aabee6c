//! Module name → instance factory (spec §2 component 3). Turns the ordered
//! `modules` list and `moduleConfig` mapping from `radius-config` into the
//! `Vec<Arc<dyn Module>>` the pipeline executor runs, deriving cross-module
//! bindings that aren't expressed directly in a single module's config.

use radius_core::clock::Clock;
use radius_core::{AuditSink, CoreError, Module};
use radius_state::Store;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::approval_gate::ApprovalGate;
use crate::command_guard::CommandGuard;
use crate::egress_guard::EgressGuard;
use crate::exec_sandbox::ExecSandbox;
use crate::fs_guard::FsGuard;
use crate::kill_switch::KillSwitch;
use crate::output_dlp::OutputDlp;
use crate::rate_budget::RateBudget;
use crate::repetition_guard::RepetitionGuard;
use crate::self_defense::SelfDefense;
use crate::skill_scanner::SkillScanner;
use crate::tool_policy::ToolPolicy;
use crate::tripwire_guard::TripwireGuard;
use crate::verdict_provider::VerdictProvider;
use crate::audit::Audit;

/// Shared collaborators every registry-built module may need.
pub struct RegistryContext {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub audit_sink: Arc<dyn AuditSink>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Derive `egress_guard.bindings[tool]` from `tool_policy.rules[].egress`
/// when the egress_guard config doesn't already declare bindings directly
/// (spec §4.2.6: "tool bindings may be supplied directly or derived from
/// `tool_policy.rules[].egress`, first rule per tool wins").
fn with_derived_egress_bindings(egress_cfg: &Value, tool_policy_cfg: &Value) -> Value {
    if egress_cfg.get("bindings").is_some() {
        return egress_cfg.clone();
    }
    let Some(rules) = tool_policy_cfg.get("rules").and_then(Value::as_array) else {
        return egress_cfg.clone();
    };
    let mut bindings = Map::new();
    for rule in rules {
        let Some(tool) = rule.get("tool").and_then(Value::as_str) else {
            continue;
        };
        if bindings.contains_key(tool) {
            continue;
        }
        if let Some(egress) = rule.get("egress") {
            bindings.insert(tool.to_string(), egress.clone());
        }
    }
    if bindings.is_empty() {
        return egress_cfg.clone();
    }
    let mut merged = egress_cfg.as_object().cloned().unwrap_or_default();
    merged.insert("bindings".to_string(), Value::Object(bindings));
    Value::Object(merged)
}

/// Build one module instance by name, with its slice of `moduleConfig`.
pub fn build_module(
    name: &str,
    module_config: &Map<String, Value>,
    ctx: &RegistryContext,
) -> Result<Arc<dyn Module>, CoreError> {
    let cfg = module_config.get(name).cloned().unwrap_or_else(empty_object);
    let module: Arc<dyn Module> = match name {
        "kill_switch" => Arc::new(KillSwitch::new(&cfg)),
        "tool_policy" => Arc::new(ToolPolicy::new(&cfg)),
        "fs_guard" => Arc::new(FsGuard::new(&cfg)),
        "command_guard" => Arc::new(CommandGuard::new(&cfg)),
        "exec_sandbox" => Arc::new(ExecSandbox::new(&cfg)),
        "egress_guard" => {
            let tool_policy_cfg = module_config.get("tool_policy").cloned().unwrap_or_else(empty_object);
            let derived = with_derived_egress_bindings(&cfg, &tool_policy_cfg);
            Arc::new(EgressGuard::new(&derived))
        }
        "output_dlp" => Arc::new(OutputDlp::new(&cfg)),
        "rate_budget" => Arc::new(RateBudget::new(&cfg, ctx.store.clone(), ctx.clock.clone())),
        "repetition_guard" => Arc::new(RepetitionGuard::new(&cfg, ctx.store.clone(), ctx.clock.clone())),
        "tripwire_guard" => Arc::new(TripwireGuard::new(&cfg)),
        "self_defense" => Arc::new(SelfDefense::new(&cfg)),
        "approval_gate" => Arc::new(ApprovalGate::new(&cfg, ctx.store.clone(), ctx.clock.clone())),
        "skill_scanner" => Arc::new(SkillScanner::new(&cfg)),
        "verdict_provider" => Arc::new(VerdictProvider::new(&cfg)),
        "audit" => Arc::new(Audit::new(&cfg, ctx.audit_sink.clone())),
        other => return Err(CoreError::UnknownModule(other.to_string())),
    };
    Ok(module)
}

/// Build the full ordered module list the pipeline executor runs, per
/// `config.modules` and `config.moduleConfig`.
pub fn build_modules(
    modules: &[String],
    module_config: &Map<String, Value>,
    ctx: &RegistryContext,
) -> Result<Vec<Arc<dyn Module>>, CoreError> {
    modules.iter().map(|name| build_module(name, module_config, ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::clock::SystemClock;
    use radius_core::CanonicalEvent;
    use radius_core::PipelineResult;
    use radius_state::InMemoryStore;
    use serde_json::json;

    struct NullSink;
    impl AuditSink for NullSink {
        fn record_event(&self, _event: &CanonicalEvent) {}
        fn record_result(&self, _event: &CanonicalEvent, _result: &PipelineResult) {}
    }

    fn ctx() -> RegistryContext {
        RegistryContext {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(SystemClock),
            audit_sink: Arc::new(NullSink),
        }
    }

    #[test]
    fn builds_every_known_module_name() {
        let names = [
            "kill_switch",
            "tool_policy",
            "fs_guard",
            "command_guard",
            "exec_sandbox",
            "egress_guard",
            "output_dlp",
            "rate_budget",
            "repetition_guard",
            "tripwire_guard",
            "self_defense",
            "approval_gate",
            "skill_scanner",
            "verdict_provider",
            "audit",
        ];
        let context = ctx();
        let config = Map::new();
        for name in names {
            assert!(build_module(name, &config, &context).is_ok(), "failed to build {name}");
        }
    }

    #[test]
    fn unknown_module_name_errors() {
        let context = ctx();
        let config = Map::new();
        assert!(build_module("not_a_real_module", &config, &context).is_err());
    }

    #[test]
    fn egress_bindings_derived_from_tool_policy_rules() {
        let mut config = Map::new();
        config.insert(
            "tool_policy".to_string(),
            json!({"rules": [{"tool": "WebFetch", "egress": {"mode": "intersect", "allowedDomains": ["example.com"]}}]}),
        );
        let context = ctx();
        // Indirectly exercised via build_module; direct assertion on the
        // derived JSON shape.
        let tool_policy_cfg = config.get("tool_policy").cloned().unwrap();
        let derived = with_derived_egress_bindings(&empty_object(), &tool_policy_cfg);
        assert!(derived.get("bindings").unwrap().get("WebFetch").is_some());
        assert!(build_module("egress_guard", &config, &context).is_ok());
    }
}
