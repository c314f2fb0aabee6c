//! 4.2.5 exec_sandbox — wraps shell commands in a `bwrap` (bubblewrap)
//! sandbox invocation, or denies/alerts when no sandbox engine is available.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Patch, Phase, Severity};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::common::{parse_mode, str_list, str_set};

const DEFAULT_SHELL_TOOLS: [&str; 1] = ["Bash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    None,
    Bwrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetworkPolicy {
    Inherit,
    Deny,
}

pub struct ExecSandbox {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    shell_tools: HashSet<String>,
    engine: Engine,
    required: bool,
    network: NetworkPolicy,
    legacy_share_network: bool,
    read_only_paths: Vec<String>,
    read_write_paths: Vec<String>,
    tmpfs_paths: Vec<String>,
    shell: String,
    shell_flag: String,
    probe_result: OnceLock<bool>,
}

impl ExecSandbox {
    pub fn new(cfg: &Value) -> Self {
        let engine = match cfg.get("engine").and_then(Value::as_str) {
            Some("bwrap") => Engine::Bwrap,
            _ => Engine::None,
        };
        let network = match cfg.get("childPolicy").and_then(|c| c.get("network")).and_then(Value::as_str) {
            Some("deny") => NetworkPolicy::Deny,
            Some("inherit") => NetworkPolicy::Inherit,
            _ => NetworkPolicy::Deny,
        };
        let shell_tools = {
            let configured = str_set(cfg, "shellTools");
            if configured.is_empty() {
                DEFAULT_SHELL_TOOLS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            shell_tools,
            engine,
            required: cfg.get("required").and_then(Value::as_bool).unwrap_or(false),
            network,
            legacy_share_network: cfg.get("shareNetwork").and_then(Value::as_bool).unwrap_or(false),
            read_only_paths: str_list(cfg, "readOnlyPaths"),
            read_write_paths: str_list(cfg, "readWritePaths"),
            tmpfs_paths: str_list(cfg, "tmpfsPaths"),
            shell: cfg.get("shell").and_then(Value::as_str).unwrap_or("/bin/sh").to_string(),
            shell_flag: cfg.get("shellFlag").and_then(Value::as_str).unwrap_or("-c").to_string(),
            probe_result: OnceLock::new(),
        }
    }

    fn bwrap_available(&self) -> bool {
        *self.probe_result.get_or_init(|| {
            std::process::Command::new("bwrap")
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }

    fn share_net(&self) -> bool {
        match self.network {
            NetworkPolicy::Deny => false,
            NetworkPolicy::Inherit => self.legacy_share_network,
        }
    }

    fn build_wrapped_command(&self, original_command: &str) -> String {
        let mut tokens: Vec<String> = vec!["bwrap".to_string()];
        tokens.push("--die-with-parent".to_string());
        tokens.push("--new-session".to_string());
        tokens.push("--unshare-all".to_string());
        if self.share_net() {
            tokens.push("--share-net".to_string());
        }
        tokens.push("--proc".to_string());
        tokens.push("/proc".to_string());
        tokens.push("--dev".to_string());
        tokens.push("/dev".to_string());
        for path in &self.read_only_paths {
            tokens.push("--ro-bind".to_string());
            tokens.push(path.clone());
            tokens.push(path.clone());
        }
        for path in &self.read_write_paths {
            tokens.push("--bind".to_string());
            tokens.push(path.clone());
            tokens.push(path.clone());
        }
        for path in &self.tmpfs_paths {
            tokens.push("--tmpfs".to_string());
            tokens.push(path.clone());
        }
        tokens.push("--setenv".to_string());
        tokens.push("HOME".to_string());
        tokens.push("/tmp".to_string());
        tokens.push("--setenv".to_string());
        tokens.push("TMPDIR".to_string());
        tokens.push("/tmp".to_string());
        tokens.push("--".to_string());
        tokens.push(self.shell.clone());
        tokens.push(self.shell_flag.clone());
        tokens.push(original_command.to_string());

        tokens.iter().map(|t| shell_escape(t)).collect::<Vec<_>>().join(" ")
    }
}

/// Single-quote `s`, escaping embedded single quotes as `'\''`.
fn shell_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

#[async_trait]
impl Module for ExecSandbox {
    fn name(&self) -> &str {
        "exec_sandbox"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        let Some(call) = &event.tool_call else {
            return Ok(Decision::allow(self.name(), "no tool call"));
        };
        if !self.shell_tools.contains(&call.name) {
            return Ok(Decision::allow(self.name(), "not a shell tool"));
        }

        match self.engine {
            Engine::None => {
                if self.required {
                    Ok(Decision::deny(self.name(), "sandbox engine required but engine=none", Severity::Critical))
                } else {
                    Ok(Decision::alert(self.name(), "no sandbox engine configured", Severity::Medium))
                }
            }
            Engine::Bwrap => {
                if !self.bwrap_available() {
                    return if self.required {
                        Ok(Decision::deny(self.name(), "bwrap required but unavailable", Severity::Critical))
                    } else {
                        Ok(Decision::alert(self.name(), "bwrap unavailable", Severity::Medium))
                    };
                }
                let Some(command) = call.arguments.get("command").and_then(Value::as_str) else {
                    return Ok(Decision::allow(self.name(), "no command argument"));
                };
                let wrapped = self.build_wrapped_command(command);
                Ok(Decision::modify(
                    self.name(),
                    "wrapped command in bwrap sandbox",
                    Patch {
                        tool_arguments: Some(json!({"command": wrapped})),
                        ..Default::default()
                    },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_escape_handles_embedded_quotes() {
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape("plain"), "'plain'");
    }

    #[test]
    fn wrapped_command_contains_unshare_all() {
        let cfg = json!({"engine": "bwrap"});
        let sandbox = ExecSandbox::new(&cfg);
        let wrapped = sandbox.build_wrapped_command("echo hi");
        assert!(wrapped.contains("--unshare-all"));
        assert!(wrapped.starts_with("'bwrap'"));
    }

    #[test]
    fn network_deny_omits_share_net() {
        let cfg = json!({"engine": "bwrap", "childPolicy": {"network": "deny"}, "shareNetwork": true});
        let sandbox = ExecSandbox::new(&cfg);
        assert!(!sandbox.share_net());
    }

    #[test]
    fn network_inherit_honors_legacy_flag() {
        let cfg = json!({"engine": "bwrap", "childPolicy": {"network": "inherit"}, "shareNetwork": true});
        let sandbox = ExecSandbox::new(&cfg);
        assert!(sandbox.share_net());
    }
}
