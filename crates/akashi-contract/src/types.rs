// crates/akashi-contract/src/types.rs
// ============================================================================
// Module: Contract Types
// Description: Wire shapes and stable error codes for Akashi API surfaces.
// Purpose: Provide canonical envelopes shared by HTTP, MCP, and SDK layers.
// Dependencies: akashi-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every API surface speaks these shapes: success responses wrap `data` with
//! request metadata, error responses carry a stable machine-readable code.
//! Transports translate between their framing and these types; the core
//! pipeline never sees them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use akashi_core::AgentName;
use akashi_core::AlternativeDraft;
use akashi_core::Conflict;
use akashi_core::Decision;
use akashi_core::DecisionDraft;
use akashi_core::DecisionId;
use akashi_core::EvidenceDraft;
use akashi_core::IdempotencyKey;
use akashi_core::OrgId;
use akashi_core::RunId;
use akashi_core::StoreError;
use akashi_core::Timestamp;
use akashi_core::runtime::PipelineError;
use akashi_core::runtime::TraceRequest;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable error codes surfaced to API callers.
///
/// # Invariants
/// - Serialized labels never change once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request failed validation.
    Validation,
    /// Credentials missing or invalid.
    Auth,
    /// Authenticated principal lacks the required role.
    Permission,
    /// Referenced record does not exist.
    NotFound,
    /// Idempotency in-progress or supersession race.
    Conflict,
    /// Monthly decision quota reached.
    QuotaExceeded,
    /// Caller exceeded its request rate.
    RateLimited,
    /// Relational store unavailable; retryable.
    StoreUnavailable,
    /// Vector index unavailable; retryable.
    IndexUnavailable,
    /// Unclassified server failure.
    Internal,
}

impl ErrorCode {
    /// Returns the stable string label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::StoreUnavailable => "store_unavailable",
            Self::IndexUnavailable => "index_unavailable",
            Self::Internal => "internal",
        }
    }

    /// Returns the HTTP status associated with the code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Auth => 401,
            Self::Permission => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::QuotaExceeded | Self::RateLimited => 429,
            Self::StoreUnavailable | Self::IndexUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl From<&PipelineError> for ErrorCode {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::Validation(_) => Self::Validation,
            PipelineError::PermissionDenied(_) => Self::Permission,
            PipelineError::NotFound(_) => Self::NotFound,
            PipelineError::IdempotencyInFlight => Self::Conflict,
            PipelineError::QuotaExceeded {
                ..
            } => Self::QuotaExceeded,
            PipelineError::Store(store) => match store {
                StoreError::Unavailable(_) => Self::StoreUnavailable,
                StoreError::Conflict(_) => Self::Conflict,
                StoreError::NotFound(_) => Self::NotFound,
                StoreError::QuotaExceeded {
                    ..
                } => Self::QuotaExceeded,
                StoreError::Invalid(_) | StoreError::Corrupt(_) => Self::Internal,
            },
        }
    }
}

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Request metadata attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Server-issued request identifier.
    pub request_id: String,
    /// Response timestamp.
    pub timestamp: Timestamp,
}

/// Success envelope wrapping response data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Response payload.
    pub data: T,
    /// Request metadata.
    pub meta: ResponseMeta,
}

/// Error body with a stable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error envelope wrapping an error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error body.
    pub error: ErrorBody,
    /// Request metadata.
    pub meta: ResponseMeta,
}

impl ErrorEnvelope {
    /// Builds an error envelope from a pipeline error.
    #[must_use]
    pub fn from_pipeline(error: &PipelineError, meta: ResponseMeta) -> Self {
        Self {
            error: ErrorBody {
                code: ErrorCode::from(error),
                message: error.to_string(),
                details: None,
            },
            meta,
        }
    }
}

// ============================================================================
// SECTION: Trace Shapes
// ============================================================================

/// Decision payload inside a trace request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDecisionBody {
    /// Decision type label.
    pub decision_type: String,
    /// Chosen outcome.
    pub outcome: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional reasoning text.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Alternatives considered.
    #[serde(default)]
    pub alternatives: Vec<AlternativeDraft>,
    /// Evidence consulted.
    #[serde(default)]
    pub evidence: Vec<EvidenceDraft>,
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

/// `POST /v1/trace` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBody {
    /// Logical agent recording the decision.
    pub agent_id: AgentName,
    /// Existing run to record under.
    #[serde(default)]
    pub run_id: Option<RunId>,
    /// Decision payload.
    pub decision: TraceDecisionBody,
    /// Free-form request metadata.
    #[serde(default)]
    pub metadata: Value,
}

impl TraceBody {
    /// Converts the wire body into a core trace request.
    ///
    /// The organization comes from the authenticated principal and the
    /// idempotency key from the transport header, never from the body.
    #[must_use]
    pub fn into_request(
        self,
        org_id: OrgId,
        idempotency_key: Option<IdempotencyKey>,
    ) -> TraceRequest {
        TraceRequest {
            org_id,
            agent: self.agent_id,
            run_id: self.run_id,
            decision: DecisionDraft {
                decision_type: self.decision.decision_type,
                outcome: self.decision.outcome,
                confidence: self.decision.confidence,
                reasoning: self.decision.reasoning,
                metadata: self.metadata,
                embedding: self.decision.embedding,
                precedent_ref: self.decision.precedent_ref,
                valid_from: self.decision.valid_from,
            },
            alternatives: self.decision.alternatives,
            evidence: self.decision.evidence,
            events: Vec::new(),
            idempotency_key,
        }
    }
}

/// `POST /v1/trace` response data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceData {
    /// Run the decision was recorded under.
    pub run_id: RunId,
    /// Recorded decision revision.
    pub decision_id: DecisionId,
    /// Events recorded for this trace.
    pub event_count: u64,
}

// ============================================================================
// SECTION: Check and Query Shapes
// ============================================================================

/// `POST /v1/check` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckBody {
    /// Decision type to look up.
    pub decision_type: String,
    /// Optional semantic query forwarded to the vector index.
    #[serde(default)]
    pub query: Option<String>,
    /// Restrict precedents to one agent.
    #[serde(default)]
    pub agent_id: Option<AgentName>,
    /// Maximum precedents to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `POST /v1/check` response data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckData {
    /// Whether any current decision of the type exists.
    pub has_precedent: bool,
    /// Matching current decisions.
    pub decisions: Vec<Decision>,
    /// Open conflicts within the decision type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}

/// Structured query body shared by query, recent, and temporal endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryBody {
    /// Restrict to one decision type.
    #[serde(default)]
    pub decision_type: Option<String>,
    /// Restrict to one agent.
    #[serde(default)]
    pub agent_id: Option<AgentName>,
    /// Time-as-of instant for temporal queries.
    #[serde(default)]
    pub as_of: Option<Timestamp>,
    /// Maximum results to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Auth Shapes
// ============================================================================

/// `POST /auth/token` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokenBody {
    /// Logical agent identifier.
    pub agent_id: AgentName,
    /// Raw API key.
    pub api_key: String,
}

/// `POST /auth/token` response data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokenData {
    /// Bearer token minted by the transport layer.
    pub token: String,
    /// Token expiry instant.
    pub expires_at: Timestamp,
}
