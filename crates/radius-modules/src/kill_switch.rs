//! 4.2.1 kill_switch — a global emergency stop gated by an environment
//! variable or marker file.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::common::{parse_mode, phase_from_str};

const TRUTHY: [&str; 5] = ["1", "true", "on", "yes", "enabled"];

pub struct KillSwitch {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    env_var: String,
    file_path: Option<PathBuf>,
    deny_phases: HashSet<Phase>,
}

impl KillSwitch {
    pub fn new(cfg: &Value) -> Self {
        let env_var = cfg
            .get("envVar")
            .and_then(Value::as_str)
            .unwrap_or("RADIUS_KILL_SWITCH")
            .to_string();
        let file_path = cfg
            .get("filePath")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let deny_phases: HashSet<Phase> = cfg
            .get("denyPhases")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .filter_map(phase_from_str)
                    .collect()
            })
            .filter(|s: &HashSet<Phase>| !s.is_empty())
            .unwrap_or_else(|| [Phase::PreRequest, Phase::PreTool].into_iter().collect());

        Self {
            mode: parse_mode(cfg),
            phases: Phase::ALL.into_iter().collect(),
            env_var,
            file_path,
            deny_phases,
        }
    }

    fn is_active(&self) -> bool {
        if let Ok(v) = std::env::var(&self.env_var) {
            if TRUTHY.contains(&v.trim().to_ascii_lowercase().as_str()) {
                return true;
            }
        }
        if let Some(path) = &self.file_path {
            if path.exists() {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl Module for KillSwitch {
    fn name(&self) -> &str {
        "kill_switch"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        if !self.is_active() {
            return Ok(Decision::allow(self.name(), "kill switch inactive"));
        }
        if self.deny_phases.contains(&event.phase) {
            return Ok(Decision::deny(
                self.name(),
                "kill switch active",
                Severity::Critical,
            ));
        }
        Ok(Decision::alert(
            self.name(),
            "kill switch active (phase not denied)",
            Severity::Critical,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::Framework;
    use serde_json::json;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn inactive_allows() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("RADIUS_KILL_SWITCH_TEST");
        let ks = KillSwitch::new(&json!({"envVar": "RADIUS_KILL_SWITCH_TEST"}));
        let event = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let decision = ks.evaluate(&event).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
    }

    #[tokio::test]
    async fn active_denies_in_deny_phase() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RADIUS_KILL_SWITCH_TEST2", "YES");
        let ks = KillSwitch::new(&json!({"envVar": "RADIUS_KILL_SWITCH_TEST2"}));
        let event = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let decision = ks.evaluate(&event).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        std::env::remove_var("RADIUS_KILL_SWITCH_TEST2");
    }

    #[tokio::test]
    async fn active_alerts_outside_deny_phases() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RADIUS_KILL_SWITCH_TEST3", "1");
        let ks = KillSwitch::new(&json!({"envVar": "RADIUS_KILL_SWITCH_TEST3"}));
        let event = CanonicalEvent::new(Phase::PostTool, Framework::Generic);
        let decision = ks.evaluate(&event).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Alert);
        std::env::remove_var("RADIUS_KILL_SWITCH_TEST3");
    }
}
