// crates/akashi-core/src/core/outbox.rs
// ============================================================================
// Module: Akashi Search Outbox Records
// Description: Transactional queue entries for vector-index synchronization.
// Purpose: Define the outbox entry shape and its delivery state machine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Outbox entries are produced inside the trace transaction and consumed by
//! the outbox worker with at-least-once delivery. Each entry moves through
//! `pending -> locked -> (succeeded | failed-retry | dead-letter)`; an entry
//! whose attempts reach the configured maximum is dead-lettered and swept
//! after a retention window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Outbox Entry
// ============================================================================

/// Index operation carried by an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxOperation {
    /// Upsert the decision's index point.
    Upsert,
    /// Delete the decision's index point.
    Delete,
}

impl OutboxOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// Pending change for the external vector index.
///
/// # Invariants
/// - `id` is monotonic within one store.
/// - The entry is weakly linked to its decision: the decision may be
///   superseded without removing outbox work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Monotonic entry identifier.
    pub id: i64,
    /// Decision the change refers to.
    pub decision_id: DecisionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Index operation to perform.
    pub operation: OutboxOperation,
    /// Delivery attempts so far.
    pub attempts: u32,
    /// Lease expiry while the entry is claimed by a worker.
    pub locked_until: Option<Timestamp>,
    /// Most recent delivery error, when any.
    pub last_error: Option<String>,
    /// Enqueue instant.
    pub created_at: Timestamp,
}
