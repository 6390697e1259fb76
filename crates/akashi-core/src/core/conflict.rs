// crates/akashi-core/src/core/conflict.rs
// ============================================================================
// Module: Akashi Conflict View
// Description: Derived contradiction pairs over current decisions.
// Purpose: Define the conflict shapes surfaced by the detector.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A conflict is a derived relation, never stored as a first-class row: two
//! current decisions of the same `decision_type` whose outcomes differ,
//! either across agents or between an agent's current revision and its most
//! recent superseded one. Each unordered pair is surfaced exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Conflict Types
// ============================================================================

/// Classification of a detected contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two different agents currently disagree on the same decision type.
    CrossAgent,
    /// One agent's current decision contradicts its most recent prior one.
    SelfContradiction,
}

impl ConflictKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CrossAgent => "cross_agent",
            Self::SelfContradiction => "self_contradiction",
        }
    }
}

/// One detected contradiction pair.
///
/// # Invariants
/// - `(decision_a, decision_b)` is normalized so each unordered pair appears
///   once; symmetry is a property of the relation, not of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Owning organization.
    pub org_id: OrgId,
    /// Decision type both sides share.
    pub decision_type: String,
    /// Conflict classification.
    pub kind: ConflictKind,
    /// First decision in the pair.
    pub decision_a: DecisionId,
    /// Agent behind the first decision.
    pub agent_a: AgentName,
    /// Outcome of the first decision.
    pub outcome_a: String,
    /// Second decision in the pair.
    pub decision_b: DecisionId,
    /// Agent behind the second decision.
    pub agent_b: AgentName,
    /// Outcome of the second decision.
    pub outcome_b: String,
    /// Instant the conflict was detected.
    pub detected_at: Timestamp,
}

/// Filters for conflict listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConflictFilter {
    /// Restrict to one decision type.
    pub decision_type: Option<String>,
    /// Restrict to one conflict kind.
    pub kind: Option<ConflictKind>,
    /// Restrict to conflicts involving one agent.
    pub agent: Option<AgentName>,
}

/// One page of conflict listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConflictPage {
    /// Conflicts sorted by `detected_at` descending.
    pub items: Vec<Conflict>,
    /// Total matching conflicts before pagination.
    pub total: u64,
}
