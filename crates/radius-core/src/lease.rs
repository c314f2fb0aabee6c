//! Approval leases (spec §3, §4.3): temporary bypass grants installed by the
//! approval resolver on `approved_temporary` outcomes.

use serde::{Deserialize, Serialize};

/// A time-bounded approval scoped to a session, optional agent, and tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalLease {
    pub id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Exact tool name, or `"*"` for any tool.
    pub tool: String,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalLease {
    /// Whether this lease covers a lookup for `(session, agent, tool)` at `now_ms`.
    pub fn matches(&self, session: &str, agent: Option<&str>, tool: &str, now_ms: u64) -> bool {
        if self.expires_at_ms <= now_ms {
            return false;
        }
        if self.session_id != session {
            return false;
        }
        if let Some(lease_agent) = &self.agent_name {
            if Some(lease_agent.as_str()) != agent {
                return false;
            }
        }
        self.tool == "*" || self.tool == tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(tool: &str, agent: Option<&str>, expires_at_ms: u64) -> ApprovalLease {
        ApprovalLease {
            id: "lease-1".to_string(),
            session_id: "s1".to_string(),
            agent_name: agent.map(str::to_string),
            tool: tool.to_string(),
            expires_at_ms,
            reason: None,
        }
    }

    #[test]
    fn wildcard_tool_matches_any_tool() {
        let l = lease("*", None, 1_000);
        assert!(l.matches("s1", Some("agent-a"), "Bash", 500));
    }

    #[test]
    fn expired_lease_never_matches() {
        let l = lease("Bash", None, 500);
        assert!(!l.matches("s1", None, "Bash", 500));
        assert!(!l.matches("s1", None, "Bash", 600));
    }

    #[test]
    fn agent_scoped_lease_rejects_other_agents() {
        let l = lease("Bash", Some("agent-a"), 1_000);
        assert!(!l.matches("s1", Some("agent-b"), "Bash", 0));
        assert!(l.matches("s1", Some("agent-a"), "Bash", 0));
    }
}
