// crates/akashi-core/src/interfaces/index.rs
// ============================================================================
// Module: Vector Index Interface
// Description: Contract for the external semantic search index.
// Purpose: Define the point shape and operations the outbox worker drives.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The vector index is an external system; the core only knows this
//! contract. Point identifiers equal decision UUIDs, so concurrent upserts
//! for the same decision converge to a single point. Index failures are
//! classified as retryable or terminal so the outbox worker can schedule
//! backoff without inspecting transport details.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::decision::Decision;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Index Point
// ============================================================================

/// One point in the external vector index.
///
/// # Invariants
/// - `id` equals the decision UUID; id-keyed upsert makes delivery
///   convergent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    /// Decision identifier, used as the point id.
    pub id: DecisionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Logical agent behind the decision.
    pub agent: AgentName,
    /// Decision type label.
    pub decision_type: String,
    /// Decision confidence.
    pub confidence: f64,
    /// Decision quality score.
    pub quality_score: f64,
    /// Valid-time start of the revision.
    pub valid_from: Timestamp,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl IndexPoint {
    /// Builds an index point from a current decision revision.
    ///
    /// Returns `None` when the revision carries no embedding.
    #[must_use]
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        let embedding = decision.embedding.clone()?;
        Some(Self {
            id: decision.id,
            org_id: decision.org_id.clone(),
            agent: decision.agent.clone(),
            decision_type: decision.decision_type.clone(),
            confidence: decision.confidence,
            quality_score: decision.quality_score,
            valid_from: decision.valid_from,
            embedding,
        })
    }
}

/// One page of a reconciliation scroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScrollPage {
    /// Point identifiers on this page.
    pub ids: Vec<DecisionId>,
    /// Cursor for the next page, when more points exist.
    pub next_cursor: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Vector index errors.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Transient transport or server failure; the outbox worker retries
    /// with backoff.
    #[error("index unavailable: {0}")]
    Unavailable(String),
    /// The index rejected the request; retrying the same payload cannot
    /// succeed.
    #[error("index rejected request: {0}")]
    Rejected(String),
}

impl IndexError {
    /// Returns whether the outbox worker should retry the batch.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Contract implemented by vector index clients.
pub trait VectorIndex: Send + Sync {
    /// Upserts points by id.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index call fails.
    fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError>;

    /// Deletes points by decision id.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index call fails.
    fn delete_by_ids(&self, ids: &[DecisionId]) -> Result<(), IndexError>;

    /// Scrolls point ids for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index call fails.
    fn scroll(&self, cursor: Option<&str>, limit: usize) -> Result<ScrollPage, IndexError>;
}
