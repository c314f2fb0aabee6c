//! Built-in and per-profile default configuration layers (spec §4.4).

use serde_json::{json, Value};

use crate::profile::Profile;

/// The lowest layer of the merge: applies regardless of profile.
pub fn builtin_defaults() -> Value {
    json!({
        "global": {
            "workspace": ".",
            "onUndefinedTemplateVar": "error",
        },
        "store": {
            "backend": "memory",
            "path": "./.radius/state.db",
        },
        "audit": {
            "file": "./radius-audit.jsonl",
            "includeArguments": true,
            "includeResults": true,
            "sinks": ["file"],
        },
        "approval": {
            "mode": "sync_wait",
            "onTimeout": "deny",
            "onConnectorError": "deny",
            "maxLeaseTtlSec": 3600,
        },
        "adapters": {},
        "modules": [
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
        ],
        "moduleConfig": {},
    })
}

/// The profile layer: defaults that vary per canonical profile name.
pub fn profile_defaults(profile: Profile) -> Value {
    use crate::profile::DefaultAction;
    let default_action = match profile.default_action() {
        DefaultAction::Deny => "deny",
        DefaultAction::Allow => "allow",
    };
    let profile_name = match profile {
        Profile::Local => "local",
        Profile::Standard => "standard",
        Profile::Unbounded => "unbounded",
    };
    json!({
        "global": {
            "profile": profile_name,
            "defaultAction": default_action,
        },
    })
}
