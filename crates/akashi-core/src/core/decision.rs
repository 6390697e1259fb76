// crates/akashi-core/src/core/decision.rs
// ============================================================================
// Module: Akashi Decision Records
// Description: Bi-temporal decision revisions and their child records.
// Purpose: Define the immutable revision shape plus trace input drafts.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A decision is a single recorded choice by an agent with a type, outcome,
//! and confidence. Revisions are append-only and content-addressed: once
//! written, the only field that ever changes is `valid_to`, which closes the
//! revision when a successor supersedes it. Alternatives and evidence are
//! created together with their decision and never updated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Decision Revision
// ============================================================================

/// Immutable bi-temporal decision revision.
///
/// # Invariants
/// - `valid_to IS NULL` marks the *current* revision; at most one revision
///   per `(org_id, agent, decision_type)` is current at any instant.
/// - `content_hash` covers `{id, decision_type, outcome, confidence,
///   reasoning, valid_from}` at microsecond resolution.
/// - Superseded revisions carry `valid_to = successor.valid_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Revision identifier.
    pub id: DecisionId,
    /// Run the decision was recorded under.
    pub run_id: RunId,
    /// Logical agent that made the decision.
    pub agent: AgentName,
    /// Owning organization.
    pub org_id: OrgId,
    /// Decision type label grouping comparable decisions.
    pub decision_type: String,
    /// Chosen outcome.
    pub outcome: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional reasoning text.
    pub reasoning: Option<String>,
    /// Free-form metadata.
    pub metadata: Value,
    /// Optional embedding vector for semantic search.
    pub embedding: Option<Vec<f32>>,
    /// Quality score assigned at ingestion.
    pub quality_score: f64,
    /// Optional precedent this decision followed.
    pub precedent_ref: Option<DecisionId>,
    /// Valid-time start.
    pub valid_from: Timestamp,
    /// Valid-time end; `None` while the revision is current.
    pub valid_to: Option<Timestamp>,
    /// Transaction-time instant the revision was recorded.
    pub transaction_time: Timestamp,
    /// Versioned content hash.
    pub content_hash: String,
}

impl Decision {
    /// Returns whether this revision is the current one.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// Rejected or considered alternative attached to a decision.
///
/// # Invariants
/// - Created together with its decision; never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Alternative identifier.
    pub id: Uuid,
    /// Owning decision revision.
    pub decision_id: DecisionId,
    /// Alternative label.
    pub label: String,
    /// Optional comparative score.
    pub score: Option<f64>,
    /// Whether this alternative was the selected outcome.
    pub selected: bool,
    /// Optional reason the alternative was rejected.
    pub rejection_reason: Option<String>,
    /// Free-form metadata.
    pub metadata: Value,
}

/// Evidence considered while making a decision.
///
/// # Invariants
/// - Created together with its decision; never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Evidence identifier.
    pub id: Uuid,
    /// Owning decision revision.
    pub decision_id: DecisionId,
    /// Evidence source classification.
    pub source_type: String,
    /// Optional source location.
    pub source_uri: Option<String>,
    /// Evidence content.
    pub content: String,
    /// Optional relevance score.
    pub relevance_score: Option<f64>,
    /// Free-form metadata.
    pub metadata: Value,
}

// ============================================================================
// SECTION: Trace Drafts
// ============================================================================

/// Caller-supplied decision payload before ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDraft {
    /// Decision type label.
    pub decision_type: String,
    /// Chosen outcome.
    pub outcome: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional reasoning text.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
    /// Optional embedding vector.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Optional precedent reference.
    #[serde(default)]
    pub precedent_ref: Option<DecisionId>,
    /// Optional caller-supplied valid-time start.
    #[serde(default)]
    pub valid_from: Option<Timestamp>,
}

/// Caller-supplied alternative payload before ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeDraft {
    /// Alternative label.
    pub label: String,
    /// Optional comparative score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Whether this alternative was the selected outcome.
    #[serde(default)]
    pub selected: bool,
    /// Optional rejection reason.
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
}

/// Caller-supplied evidence payload before ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDraft {
    /// Evidence source classification.
    pub source_type: String,
    /// Optional source location.
    #[serde(default)]
    pub source_uri: Option<String>,
    /// Evidence content.
    pub content: String,
    /// Optional relevance score.
    #[serde(default)]
    pub relevance_score: Option<f64>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// Aggregate decision quality statistics for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DecisionQualityStats {
    /// Current decision count.
    pub total_decisions: u64,
    /// Mean confidence over current decisions.
    pub average_confidence: f64,
    /// Mean quality score over current decisions.
    pub average_quality: f64,
}

/// Evidence coverage statistics for one organization.
///
/// Coverage is defined as `with_evidence / total_decisions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvidenceCoverageStats {
    /// Current decision count.
    pub total_decisions: u64,
    /// Current decisions with at least one evidence record.
    pub with_evidence: u64,
    /// `with_evidence / total_decisions`, `0.0` when there are no decisions.
    pub coverage: f64,
}
