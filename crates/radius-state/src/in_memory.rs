//! In-memory `Store`: per-key `dashmap` shards so unrelated sessions never
//! contend on a single lock (spec §9 "a global mutex ... is prohibited").

use dashmap::DashMap;
use radius_core::ApprovalLease;

use crate::{RateBudgetOutcome, StateError, Store};

#[derive(Debug, Clone)]
struct RepetitionEntry {
    fingerprint: String,
    last_seen_ms: u64,
    count: u64,
}

/// Default in-memory backend, used whenever no module declares
/// `store.required = true`.
#[derive(Default)]
pub struct InMemoryStore {
    leases: DashMap<String, Vec<ApprovalLease>>,
    rate_windows: DashMap<String, Vec<u64>>,
    repetitions: DashMap<String, RepetitionEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn insert_lease(&self, lease: ApprovalLease) -> Result<(), StateError> {
        let mut entry = self.leases.entry(lease.session_id.clone()).or_default();
        entry.retain(|existing| existing.expires_at_ms > lease.expires_at_ms || existing.id != lease.id);
        entry.push(lease);
        Ok(())
    }

    fn find_active_lease(
        &self,
        session: &str,
        agent: Option<&str>,
        tool: &str,
        now_ms: u64,
    ) -> Result<Option<ApprovalLease>, StateError> {
        let Some(leases) = self.leases.get(session) else {
            return Ok(None);
        };
        let best = leases
            .iter()
            .filter(|l| l.matches(session, agent, tool, now_ms))
            .max_by_key(|l| l.expires_at_ms)
            .cloned();
        Ok(best)
    }

    fn consume_rate_budget(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        max_calls: u64,
    ) -> Result<RateBudgetOutcome, StateError> {
        let mut entry = self.rate_windows.entry(key.to_string()).or_default();
        let cutoff = now_ms.saturating_sub(window_ms);
        entry.retain(|ts| *ts > cutoff);
        if entry.len() as u64 >= max_calls {
            return Ok(RateBudgetOutcome {
                allowed: false,
                count: entry.len() as u64,
            });
        }
        entry.push(now_ms);
        Ok(RateBudgetOutcome {
            allowed: true,
            count: entry.len() as u64,
        })
    }

    fn consume_repetition(
        &self,
        bucket_key: &str,
        fingerprint: &str,
        now_ms: u64,
        cooldown_ms: u64,
    ) -> Result<u64, StateError> {
        let mut entry = self.repetitions.entry(bucket_key.to_string()).or_insert(RepetitionEntry {
            fingerprint: String::new(),
            last_seen_ms: 0,
            count: 0,
        });
        let within_cooldown = now_ms.saturating_sub(entry.last_seen_ms) <= cooldown_ms;
        let repeats = entry.fingerprint == fingerprint && within_cooldown && entry.count > 0;
        entry.count = if repeats { entry.count + 1 } else { 1 };
        entry.fingerprint = fingerprint.to_string();
        entry.last_seen_ms = now_ms;
        Ok(entry.count)
    }
}
