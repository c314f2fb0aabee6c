//! The resolved outcome of one approval request (spec §4.3).

/// What a connector (chat, HTTP bridge) resolved a challenge to.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// Approved for this one call only.
    Approved,
    /// Approved and backed by a temporary lease; `ttl_sec` is the
    /// connector-requested TTL, if any (the resolver clamps it).
    ApprovedTemporary { ttl_sec: Option<u64> },
    /// Explicitly rejected.
    Denied { reason: Option<String> },
    /// No response arrived before the challenge deadline.
    Timeout,
    /// The connector itself failed (network error, malformed response, ...).
    Error { reason: String },
}
