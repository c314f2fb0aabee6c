//! 4.2.11 self_defense — guards an immutable baseline (config files, hook
//! artifacts) against both direct tool writes and out-of-band tampering
//! detected by digest mismatch.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::canon::{canonicalize, is_within};
use crate::common::{parse_mode, str_list};

const MUTATING_TOOLS: [&str; 10] = [
    "Write", "Edit", "NotebookEdit", "MultiEdit", "Delete", "Move", "Copy", "Rename", "Chmod", "Chown",
];
const PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnWriteAttempt {
    Deny,
    Challenge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnHashMismatch {
    Deny,
    KillSwitch,
}

#[derive(Debug, Clone)]
enum Target {
    Exact(PathBuf),
    Prefix(PathBuf),
}

fn digest_exact(path: &PathBuf) -> Option<String> {
    let content = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Some(hex::encode(hasher.finalize()))
}

fn digest_prefix(path: &PathBuf) -> Option<String> {
    let mut entries: Vec<PathBuf> = walk(path);
    entries.sort();
    let mut hasher = Sha256::new();
    for entry in entries {
        if let Ok(content) = std::fs::read(&entry) {
            hasher.update(entry.to_string_lossy().as_bytes());
            hasher.update(&content);
        }
    }
    Some(hex::encode(hasher.finalize()))
}

fn walk(dir: &PathBuf) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}

fn baseline_digest(target: &Target) -> Option<String> {
    match target {
        Target::Exact(p) => digest_exact(p),
        Target::Prefix(p) => digest_prefix(p),
    }
}

pub struct SelfDefense {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    targets: Vec<Target>,
    baselines: RwLock<Vec<Option<String>>>,
    on_write_attempt: OnWriteAttempt,
    on_hash_mismatch: OnHashMismatch,
    kill_switch_path: PathBuf,
    unlock_token_path: Option<PathBuf>,
    unlock_ttl_secs: u64,
}

impl SelfDefense {
    pub fn new(cfg: &Value) -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let targets: Vec<Target> = cfg
            .get("targets")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| {
                        let path = t.get("path").and_then(Value::as_str)?;
                        let canonical = canonicalize(path.trim_end_matches("/**"), &home, &cwd);
                        match t.get("type").and_then(Value::as_str) {
                            Some("prefix") => Some(Target::Prefix(canonical)),
                            _ => Some(Target::Exact(canonical)),
                        }
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                str_list(cfg, "explicitTargets")
                    .into_iter()
                    .map(|p| Target::Exact(canonicalize(&p, &home, &cwd)))
                    .collect()
            });
        let baselines = targets.iter().map(baseline_digest).collect();
        let on_write_attempt = match cfg.get("onWriteAttempt").and_then(Value::as_str) {
            Some("challenge") => OnWriteAttempt::Challenge,
            _ => OnWriteAttempt::Deny,
        };
        let on_hash_mismatch = match cfg.get("onHashMismatch").and_then(Value::as_str) {
            Some("kill_switch") => OnHashMismatch::KillSwitch,
            _ => OnHashMismatch::Deny,
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreRequest, Phase::PreTool, Phase::PostTool].into_iter().collect(),
            targets,
            baselines: RwLock::new(baselines),
            on_write_attempt,
            on_hash_mismatch,
            kill_switch_path: cfg
                .get("killSwitchPath")
                .and_then(Value::as_str)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.radius/kill_switch")),
            unlock_token_path: cfg.get("unlockTokenPath").and_then(Value::as_str).map(PathBuf::from),
            unlock_ttl_secs: cfg.get("unlockTtlSec").and_then(Value::as_u64).unwrap_or(300),
        }
    }

    fn unlocked(&self) -> bool {
        let Some(path) = &self.unlock_token_path else {
            return false;
        };
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        modified.elapsed().map(|age| age.as_secs() <= self.unlock_ttl_secs).unwrap_or(false)
    }

    fn target_for_path(&self, canonical: &PathBuf) -> Option<&Target> {
        self.targets.iter().find(|t| match t {
            Target::Exact(p) => p == canonical,
            Target::Prefix(p) => is_within(p, canonical),
        })
    }

    fn candidate_paths(args: &serde_json::Map<String, Value>) -> Vec<String> {
        PATH_KEYS
            .iter()
            .filter_map(|k| args.get(*k).and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Module for SelfDefense {
    fn name(&self) -> &str {
        "self_defense"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        if self.unlocked() {
            return Ok(Decision::allow(self.name(), "unlock token active"));
        }

        if event.phase == Phase::PreTool {
            let Some(call) = &event.tool_call else {
                return Ok(Decision::allow(self.name(), "no tool call"));
            };
            if !MUTATING_TOOLS.contains(&call.name.as_str()) {
                return Ok(Decision::allow(self.name(), "not a mutating tool"));
            }
            let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"));
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            for raw in Self::candidate_paths(&call.arguments) {
                let canonical = canonicalize(&raw, &home, &cwd);
                if self.target_for_path(&canonical).is_some() {
                    let reason = format!("{} is an immutable self-defense target", canonical.display());
                    return Ok(match self.on_write_attempt {
                        OnWriteAttempt::Deny => Decision::deny(self.name(), reason, Severity::Critical),
                        OnWriteAttempt::Challenge => Decision::challenge(
                            self.name(),
                            reason,
                            radius_core::ChallengeSpec {
                                channel: radius_core::Channel::Orchestrator,
                                prompt: "Approve modification of a protected file?".to_string(),
                                timeout_seconds: 60,
                            },
                        ),
                    });
                }
            }
            return Ok(Decision::allow(self.name(), "no protected target touched"));
        }

        let mut baselines = self.baselines.write().map_err(|e| ModuleError::new(e.to_string()))?;
        for (i, target) in self.targets.iter().enumerate() {
            let current = baseline_digest(target);
            if baselines[i] != current {
                baselines[i] = current;
                let reason = "immutable target digest mismatch detected".to_string();
                return Ok(match self.on_hash_mismatch {
                    OnHashMismatch::Deny => Decision::deny(self.name(), reason, Severity::Critical),
                    OnHashMismatch::KillSwitch => {
                        let _ = std::fs::write(&self.kill_switch_path, b"1");
                        Decision::deny(self.name(), reason, Severity::Critical)
                    }
                });
            }
        }
        Ok(Decision::allow(self.name(), "baseline digests unchanged"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    #[tokio::test]
    async fn write_to_protected_exact_target_denies() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.yaml");
        std::fs::write(&target, b"original").unwrap();
        let cfg = json!({"targets": [{"type": "exact", "path": target.to_string_lossy()}]});
        let guard = SelfDefense::new(&cfg);

        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let mut args = serde_json::Map::new();
        args.insert("file_path".to_string(), json!(target.to_string_lossy()));
        e.tool_call = Some(ToolCall {
            name: "Write".to_string(),
            arguments: args,
            raw: None,
        });
        let decision = guard.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn digest_mismatch_is_detected_on_pre_request() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.yaml");
        std::fs::write(&target, b"original").unwrap();
        let cfg = json!({"targets": [{"type": "exact", "path": target.to_string_lossy()}]});
        let guard = SelfDefense::new(&cfg);

        std::fs::write(&target, b"tampered").unwrap();
        let e = CanonicalEvent::new(Phase::PreRequest, Framework::Generic);
        let decision = guard.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn unchanged_baseline_allows() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.yaml");
        std::fs::write(&target, b"original").unwrap();
        let cfg = json!({"targets": [{"type": "exact", "path": target.to_string_lossy()}]});
        let guard = SelfDefense::new(&cfg);
        let e = CanonicalEvent::new(Phase::PostTool, Framework::Generic);
        let decision = guard.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }
}
