//! The durable state abstraction (spec §3 Lifecycle, §9 "Durable state
//! abstraction"): one trait, two implementations with identical observable
//! semantics — in-memory (per-key sharded, no global lock) and SQLite
//! (single transaction per call, WAL mode).

pub mod error;
pub mod in_memory;
pub mod sqlite;

pub use error::StateError;
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use radius_core::ApprovalLease;

/// Outcome of a rate-budget consumption (spec §4.2.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudgetOutcome {
    pub allowed: bool,
    /// Count of calls observed in the current window, including this one
    /// when `allowed` is true.
    pub count: u64,
}

/// The four operations every durable-state backend must provide (spec §9).
pub trait Store: Send + Sync {
    /// Insert a lease, replacing any expired entry occupying its slot.
    fn insert_lease(&self, lease: ApprovalLease) -> Result<(), StateError>;

    /// Most-recently-expiring lease matching `(session, agent, tool)` at `now_ms`.
    fn find_active_lease(
        &self,
        session: &str,
        agent: Option<&str>,
        tool: &str,
        now_ms: u64,
    ) -> Result<Option<ApprovalLease>, StateError>;

    /// Prune expired entries for `key`, count, compare against `max_calls`,
    /// and — only if still within budget — record this call, all atomically.
    fn consume_rate_budget(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        max_calls: u64,
    ) -> Result<RateBudgetOutcome, StateError>;

    /// Atomically read-and-update the fingerprint streak for `bucket_key`,
    /// returning the post-update repeat count.
    fn consume_repetition(
        &self,
        bucket_key: &str,
        fingerprint: &str,
        now_ms: u64,
        cooldown_ms: u64,
    ) -> Result<u64, StateError>;
}
