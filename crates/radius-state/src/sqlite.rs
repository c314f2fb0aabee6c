//! SQLite-backed `Store`: WAL mode, one `BEGIN IMMEDIATE` transaction per
//! mutating call (spec §5 "Shared-resource policy", §6 persistence schema).

use std::path::Path;
use std::sync::Mutex;

use radius_core::ApprovalLease;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{RateBudgetOutcome, StateError, Store};

/// The default persistence file when SQLite backing is enabled.
pub const DEFAULT_DB_PATH: &str = "./.radius/state.db";

/// SQLite-backed implementation. Required whenever any module declares
/// `store.required = true` (spec §9).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS approval_leases (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                agent_name TEXT,
                tool TEXT NOT NULL,
                expires_at_ms INTEGER NOT NULL,
                reason TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_leases_lookup
                ON approval_leases (session_id, agent_name, tool, expires_at_ms);

            CREATE TABLE IF NOT EXISTS rate_budget_events (
                key TEXT NOT NULL,
                ts_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rate_events_key
                ON rate_budget_events (key, ts_ms);

            CREATE TABLE IF NOT EXISTS repetition_state (
                bucket_key TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                last_seen_ms INTEGER NOT NULL,
                count INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|_| StateError::LockPoisoned("sqlite connection".to_string()))
    }
}

impl Store for SqliteStore {
    fn insert_lease(&self, lease: ApprovalLease) -> Result<(), StateError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM approval_leases WHERE session_id = ?1 AND tool = ?2 AND expires_at_ms <= ?3",
            params![lease.session_id, lease.tool, lease.expires_at_ms],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO approval_leases (id, session_id, agent_name, tool, expires_at_ms, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lease.id,
                lease.session_id,
                lease.agent_name,
                lease.tool,
                lease.expires_at_ms,
                lease.reason,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn find_active_lease(
        &self,
        session: &str,
        agent: Option<&str>,
        tool: &str,
        now_ms: u64,
    ) -> Result<Option<ApprovalLease>, StateError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM approval_leases WHERE expires_at_ms <= ?1",
            params![now_ms],
        )?;
        let mut stmt = tx.prepare(
            "SELECT id, session_id, agent_name, tool, expires_at_ms, reason
             FROM approval_leases
             WHERE session_id = ?1
               AND (agent_name IS NULL OR agent_name = ?2)
               AND (tool = '*' OR tool = ?3)
               AND expires_at_ms > ?4
             ORDER BY expires_at_ms DESC
             LIMIT 1",
        )?;
        let found = stmt
            .query_row(params![session, agent, tool, now_ms], |row| {
                Ok(ApprovalLease {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    agent_name: row.get(2)?,
                    tool: row.get(3)?,
                    expires_at_ms: row.get::<_, i64>(4)? as u64,
                    reason: row.get(5)?,
                })
            })
            .optional()?;
        drop(stmt);
        tx.commit()?;
        Ok(found)
    }

    fn consume_rate_budget(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        max_calls: u64,
    ) -> Result<RateBudgetOutcome, StateError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let cutoff = now_ms.saturating_sub(window_ms) as i64;
        tx.execute(
            "DELETE FROM rate_budget_events WHERE key = ?1 AND ts_ms <= ?2",
            params![key, cutoff],
        )?;
        tx.execute(
            "DELETE FROM rate_budget_events WHERE ts_ms <= ?1",
            params![now_ms.saturating_sub(24 * 60 * 60 * 1000) as i64],
        )?;
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM rate_budget_events WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        let count = count as u64;
        if count >= max_calls {
            tx.commit()?;
            return Ok(RateBudgetOutcome {
                allowed: false,
                count,
            });
        }
        tx.execute(
            "INSERT INTO rate_budget_events (key, ts_ms) VALUES (?1, ?2)",
            params![key, now_ms as i64],
        )?;
        tx.commit()?;
        Ok(RateBudgetOutcome {
            allowed: true,
            count: count + 1,
        })
    }

    fn consume_repetition(
        &self,
        bucket_key: &str,
        fingerprint: &str,
        now_ms: u64,
        cooldown_ms: u64,
    ) -> Result<u64, StateError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing: Option<(String, i64, i64)> = tx
            .query_row(
                "SELECT fingerprint, last_seen_ms, count FROM repetition_state WHERE bucket_key = ?1",
                params![bucket_key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let new_count = match existing {
            Some((prev_fp, last_seen_ms, prev_count))
                if prev_fp == fingerprint
                    && now_ms.saturating_sub(last_seen_ms as u64) <= cooldown_ms
                    && prev_count > 0 =>
            {
                prev_count as u64 + 1
            }
            _ => 1,
        };
        tx.execute(
            "INSERT INTO repetition_state (bucket_key, fingerprint, last_seen_ms, count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(bucket_key) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                last_seen_ms = excluded.last_seen_ms,
                count = excluded.count",
            params![bucket_key, fingerprint, now_ms as i64, new_count as i64],
        )?;
        tx.commit()?;
        Ok(new_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_budget_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("state.db")).unwrap();
        for i in 0..3 {
            let outcome = store.consume_rate_budget("s1", i * 1_000, 60_000, 3).unwrap();
            assert!(outcome.allowed);
        }
        let outcome = store.consume_rate_budget("s1", 3_000, 60_000, 3).unwrap();
        assert!(!outcome.allowed);
    }

    #[test]
    fn lease_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("state.db")).unwrap();
        store
            .insert_lease(ApprovalLease {
                id: "l1".into(),
                session_id: "s1".into(),
                agent_name: None,
                tool: "*".into(),
                expires_at_ms: 10_000,
                reason: None,
            })
            .unwrap();
        let found = store.find_active_lease("s1", Some("a"), "Bash", 0).unwrap();
        assert!(found.is_some());
        let expired = store.find_active_lease("s1", Some("a"), "Bash", 20_000).unwrap();
        assert!(expired.is_none());
    }
}
