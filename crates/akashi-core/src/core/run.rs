// crates/akashi-core/src/core/run.rs
// ============================================================================
// Module: Akashi Runs and Events
// Description: Agent run records and high-volume agent events.
// Purpose: Define run lifecycle state and per-run event ordering.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every trace belongs to a run; when a caller does not name one, the
//! pipeline creates an implicit run in the `running` state. Agent events are
//! a high-volume time series with caller-assigned per-run sequence numbers;
//! `(run_id, sequence_num)` is unique and insertion order is preserved per
//! run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AgentName;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Runs
// ============================================================================

/// Lifecycle state of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is in progress.
    Running,
    /// The run completed normally.
    Completed,
    /// The run failed.
    Failed,
}

impl RunStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One execution of an agent, owning its decisions and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRun {
    /// Run identifier.
    pub id: RunId,
    /// Logical agent executing the run.
    pub agent: AgentName,
    /// Owning organization.
    pub org_id: OrgId,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Optional parent run for nested executions.
    pub parent_run_id: Option<RunId>,
    /// Optional external trace correlation identifier.
    pub trace_id: Option<String>,
    /// Start instant.
    pub started_at: Timestamp,
    /// Completion instant, when finished.
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// High-volume event emitted during a run.
///
/// # Invariants
/// - `(run_id, sequence_num)` is unique.
/// - `sequence_num` is assigned by the caller, never by the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Run the event belongs to.
    pub run_id: RunId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Event type label.
    pub event_type: String,
    /// Caller-assigned per-run sequence number.
    pub sequence_num: u64,
    /// Instant the event occurred.
    pub occurred_at: Timestamp,
    /// Logical agent that emitted the event.
    pub agent: AgentName,
    /// Free-form payload.
    pub payload: Value,
}
