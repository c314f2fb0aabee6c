//! Shared helpers every module factory uses to read its untyped
//! configuration mapping (spec §3 Module, §4.2 per-module defaults).

use radius_core::{ModuleMode, Phase};
use serde_json::Value;
use std::collections::HashSet;

/// `mode` defaults to `enforce` unless the config explicitly says `"observe"`.
pub fn parse_mode(cfg: &Value) -> ModuleMode {
    match cfg.get("mode").and_then(Value::as_str) {
        Some("observe") => ModuleMode::Observe,
        _ => ModuleMode::Enforce,
    }
}

pub fn phase_from_str(s: &str) -> Option<Phase> {
    match s {
        "pre_load" => Some(Phase::PreLoad),
        "pre_request" => Some(Phase::PreRequest),
        "pre_tool" => Some(Phase::PreTool),
        "post_tool" => Some(Phase::PostTool),
        "pre_response" => Some(Phase::PreResponse),
        _ => None,
    }
}

/// `phases` config override, falling back to `default` when absent/empty.
pub fn parse_phases(cfg: &Value, default: &[Phase]) -> HashSet<Phase> {
    let from_cfg: HashSet<Phase> = cfg
        .get("phases")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .filter_map(phase_from_str)
                .collect()
        })
        .unwrap_or_default();
    if from_cfg.is_empty() {
        default.iter().copied().collect()
    } else {
        from_cfg
    }
}

pub fn str_list(cfg: &Value, key: &str) -> Vec<String> {
    cfg.get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn str_set(cfg: &Value, key: &str) -> HashSet<String> {
    str_list(cfg, key).into_iter().collect()
}
