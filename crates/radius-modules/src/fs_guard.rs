//! 4.2.3 fs_guard — filesystem path allow/block list for file-shaped tools.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::canon::{canonicalize, is_within};
use crate::common::{parse_mode, str_set};

const DEFAULT_FILE_TOOLS: [&str; 6] = ["Read", "Write", "Edit", "Glob", "Grep", "NotebookEdit"];
const PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

pub struct FsGuard {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    file_tools: HashSet<String>,
    blocked_paths: Vec<PathBuf>,
    blocked_basenames: HashSet<String>,
    allowed_paths: Vec<PathBuf>,
    home: PathBuf,
    cwd: PathBuf,
}

impl FsGuard {
    pub fn new(cfg: &Value) -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let file_tools = {
            let configured = str_set(cfg, "fileTools");
            if configured.is_empty() {
                DEFAULT_FILE_TOOLS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        let blocked_paths = str_set(cfg, "blockedPaths")
            .into_iter()
            .map(|p| canonicalize(&p, &home, &cwd))
            .collect();
        let allowed_paths = str_set(cfg, "allowedPaths")
            .into_iter()
            .map(|p| canonicalize(&p, &home, &cwd))
            .collect();
        let blocked_basenames = str_set(cfg, "blockedBasenames")
            .into_iter()
            .map(|s| s.to_ascii_lowercase())
            .collect();
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            file_tools,
            blocked_paths,
            blocked_basenames,
            allowed_paths,
            home,
            cwd,
        }
    }

    fn extract_path(&self, args: &serde_json::Map<String, Value>) -> Option<String> {
        PATH_KEYS
            .iter()
            .find_map(|key| args.get(*key).and_then(Value::as_str).map(str::to_string))
    }
}

#[async_trait]
impl Module for FsGuard {
    fn name(&self) -> &str {
        "fs_guard"
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
        if !self.file_tools.contains(&call.name) {
            return Ok(Decision::allow(self.name(), "not a file tool"));
        }
        let Some(raw_path) = self.extract_path(&call.arguments) else {
            return Ok(Decision::allow(self.name(), "no path argument present"));
        };
        let canonical = canonicalize(&raw_path, &self.home, &self.cwd);

        if self.blocked_paths.iter().any(|b| is_within(b, &canonical)) {
            return Ok(Decision::deny(
                self.name(),
                format!("{} is in blocked prefix", canonical.display()),
                Severity::Critical,
            ));
        }

        let basename = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if self.blocked_basenames.contains(&basename) {
            return Ok(Decision::deny(
                self.name(),
                format!("{basename} is a blocked basename"),
                Severity::Critical,
            ));
        }

        if self.allowed_paths.iter().any(|a| is_within(a, &canonical)) {
            return Ok(Decision::allow(self.name(), "within allowed prefix"));
        }

        Ok(Decision::deny(
            self.name(),
            format!("{} is not within any allowed prefix", canonical.display()),
            Severity::High,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    fn event(path: &str) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let mut args = serde_json::Map::new();
        args.insert("file_path".to_string(), json!(path));
        e.tool_call = Some(ToolCall {
            name: "Read".to_string(),
            arguments: args,
            raw: None,
        });
        e
    }

    #[tokio::test]
    async fn blocked_prefix_denies_even_within_allowed() {
        let cfg = json!({
            "blockedPaths": ["/workspace/.ssh"],
            "allowedPaths": ["/workspace"],
        });
        let guard = FsGuard::new(&cfg);
        let decision = guard.evaluate(&event("/workspace/.ssh/id_rsa")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert!(decision.reason.contains("blocked prefix"));
    }

    #[tokio::test]
    async fn lookalike_prefix_is_not_allowed() {
        let cfg = json!({"allowedPaths": ["/workspace"]});
        let guard = FsGuard::new(&cfg);
        let decision = guard.evaluate(&event("/workspace-evil/x")).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn non_file_tool_is_ignored() {
        let cfg = json!({"allowedPaths": ["/workspace"]});
        let guard = FsGuard::new(&cfg);
        let mut e = event("/etc/passwd");
        e.tool_call.as_mut().unwrap().name = "Bash".to_string();
        let decision = guard.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }
}
