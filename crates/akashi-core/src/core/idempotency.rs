// crates/akashi-core/src/core/idempotency.rs
// ============================================================================
// Module: Akashi Idempotency Records
// Description: Deduplication authority for at-most-once trace ingestion.
// Purpose: Define idempotency key states, lifetimes, and cached responses.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The idempotency table is the deduplication authority for traces.
//! Concurrent requests with the same key race on the unique-key insert; the
//! winner proceeds and the loser fails fast with a conflict so the client can
//! retry. Completed keys keep a response snapshot that is replayed verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::OrgId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lifetime of an in-progress key before it may be reclaimed.
pub const IN_PROGRESS_TTL_SECONDS: i64 = 5 * 60;
/// Lifetime of a completed key and its cached response.
pub const COMPLETED_TTL_SECONDS: i64 = 48 * 60 * 60;
/// Lifetime of an abandoned key.
pub const ABANDONED_TTL_SECONDS: i64 = 24 * 60 * 60;

// ============================================================================
// SECTION: Idempotency Record
// ============================================================================

/// Lifecycle state of an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyState {
    /// A request holding this key is currently executing.
    InProgress,
    /// The request completed; the cached response is authoritative.
    Completed,
    /// The request was abandoned without completing.
    Abandoned,
}

impl IdempotencyState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns the record lifetime for this state in seconds.
    #[must_use]
    pub const fn ttl_seconds(self) -> i64 {
        match self {
            Self::InProgress => IN_PROGRESS_TTL_SECONDS,
            Self::Completed => COMPLETED_TTL_SECONDS,
            Self::Abandoned => ABANDONED_TTL_SECONDS,
        }
    }
}

/// Stored idempotency key with its lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Caller-supplied key, unique per organization.
    pub key: IdempotencyKey,
    /// Owning organization.
    pub org_id: OrgId,
    /// Lifecycle state.
    pub state: IdempotencyState,
    /// Cached response payload for completed keys.
    pub response_snapshot: Option<Value>,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Completion instant, when completed.
    pub completed_at: Option<Timestamp>,
    /// Reclamation deadline.
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    /// Returns whether the record has passed its reclamation deadline.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}
