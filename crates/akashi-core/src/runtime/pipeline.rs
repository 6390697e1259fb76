// crates/akashi-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Akashi Trace Pipeline
// Description: At-most-once trace ingestion and precedent checks.
// Purpose: Execute the canonical trace algorithm over the store seams.
// Dependencies: crate::{core, interfaces, runtime}, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The trace pipeline is the single canonical ingestion path. All API
//! surfaces (HTTP, MCP, SDKs) must call into these methods to preserve the
//! at-most-once contract: idempotency pre-check outside the transaction,
//! then quota check, supersession, decision and child inserts, outbox
//! enqueue, usage increment, and idempotency completion inside one
//! transaction executed by the store.
//!
//! Caller-supplied `valid_from` instants in the future are rejected with a
//! validation error; a five-second allowance absorbs clock skew between
//! well-behaved callers and the service.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::agent::Agent;
use crate::core::conflict::Conflict;
use crate::core::conflict::ConflictFilter;
use crate::core::decision::Alternative;
use crate::core::decision::AlternativeDraft;
use crate::core::decision::Decision;
use crate::core::decision::DecisionDraft;
use crate::core::decision::Evidence;
use crate::core::decision::EvidenceDraft;
use crate::core::hashing::ContentHashFields;
use crate::core::hashing::compute_content_hash;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::RunId;
use crate::core::run::AgentEvent;
use crate::core::run::AgentRun;
use crate::core::run::RunStatus;
use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::stores::AgentStore;
use crate::interfaces::stores::DecisionStore;
use crate::interfaces::stores::IdempotencyBegin;
use crate::interfaces::stores::IdempotencyStore;
use crate::interfaces::stores::RunStore;
use crate::interfaces::stores::StoreError;
use crate::interfaces::stores::TraceStore;
use crate::interfaces::stores::TraceWrite;
use crate::interfaces::telemetry::AuditSink;
use crate::interfaces::telemetry::MetricsSink;
use crate::interfaces::telemetry::PlaneCounter;
use crate::interfaces::telemetry::PlaneOp;
use crate::interfaces::telemetry::TraceAuditEvent;
use crate::runtime::buffer::EventBuffer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted length for decision type labels.
const MAX_DECISION_TYPE_LENGTH: usize = 256;
/// Maximum accepted length for outcome labels.
const MAX_OUTCOME_LENGTH: usize = 1024;
/// Clock-skew allowance for caller-supplied `valid_from` instants.
const MAX_FUTURE_SKEW_MICROS: i64 = 5_000_000;
/// Default precedent listing size for checks.
const DEFAULT_CHECK_LIMIT: usize = 10;

// ============================================================================
// SECTION: Requests and Receipts
// ============================================================================

/// Caller-attached event recorded alongside a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEventDraft {
    /// Event type label.
    pub event_type: String,
    /// Caller-assigned per-run sequence number.
    pub sequence_num: u64,
    /// Free-form payload.
    #[serde(default)]
    pub payload: Value,
}

/// One trace ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRequest {
    /// Owning organization.
    pub org_id: OrgId,
    /// Logical agent recording the decision.
    pub agent: AgentName,
    /// Existing run to record under; an implicit run is created when absent.
    #[serde(default)]
    pub run_id: Option<RunId>,
    /// Decision payload.
    pub decision: DecisionDraft,
    /// Alternatives considered.
    #[serde(default)]
    pub alternatives: Vec<AlternativeDraft>,
    /// Evidence consulted.
    #[serde(default)]
    pub evidence: Vec<EvidenceDraft>,
    /// Additional events to buffer with the trace.
    #[serde(default)]
    pub events: Vec<TraceEventDraft>,
    /// At-most-once deduplication key.
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Committed trace receipt; also the idempotency response snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReceipt {
    /// Recorded decision revision.
    pub decision_id: DecisionId,
    /// Run the decision belongs to.
    pub run_id: RunId,
    /// Events recorded for this trace.
    pub event_count: u64,
    /// Whether the response came from an idempotency snapshot.
    pub cached: bool,
}

/// Precedent check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Owning organization.
    pub org_id: OrgId,
    /// Decision type to look up.
    pub decision_type: String,
    /// Restrict precedents to one agent.
    #[serde(default)]
    pub agent: Option<AgentName>,
    /// Maximum precedents to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Precedent check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether any current decision of the type exists.
    pub has_precedent: bool,
    /// Matching current decisions, newest first.
    pub decisions: Vec<Decision>,
    /// Open conflicts within the decision type.
    pub conflicts: Vec<Conflict>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Trace pipeline errors.
///
/// # Invariants
/// - Variants are stable for programmatic error-code mapping.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The agent's role does not permit the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Another request holds the idempotency key.
    #[error("idempotency key is in progress")]
    IdempotencyInFlight,
    /// Monthly decision quota reached.
    #[error("quota exceeded: {count} of {limit} decisions used")]
    QuotaExceeded {
        /// Configured decision limit.
        limit: u64,
        /// Decisions already recorded this period.
        count: u64,
    },
    /// Store failure; retryable when the inner error is transient.
    #[error("store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::QuotaExceeded {
                limit,
                count,
            } => Self::QuotaExceeded {
                limit,
                count,
            },
            StoreError::NotFound(message) => Self::NotFound(message),
            other => Self::Store(other),
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Trace ingestion and precedent check engine.
///
/// Generic over the store seams so tests run against in-memory fakes.
pub struct TracePipeline<S> {
    /// Store backing every durable step.
    store: Arc<S>,
    /// Clock seam.
    clock: Arc<dyn Clock>,
    /// Audit sink for ingestion events.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink for counters and latencies.
    metrics: Arc<dyn MetricsSink>,
    /// Event buffer receiving trace events; optional for minimal hosts.
    buffer: Option<Arc<EventBuffer>>,
    /// Post-commit wake-up shared with the outbox worker.
    outbox_wake: Arc<Notify>,
}

impl<S> TracePipeline<S>
where
    S: TraceStore + IdempotencyStore + RunStore + AgentStore + DecisionStore,
{
    /// Creates a new pipeline over the provided seams.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
        buffer: Option<Arc<EventBuffer>>,
        outbox_wake: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            clock,
            audit,
            metrics,
            buffer,
            outbox_wake,
        }
    }

    /// Returns the wake-up handle shared with the outbox worker.
    #[must_use]
    pub fn outbox_wake(&self) -> Arc<Notify> {
        Arc::clone(&self.outbox_wake)
    }

    /// Records a trace with at-most-once semantics.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for validation, permission, idempotency,
    /// quota, and store failures; the transaction is rolled back atomically
    /// on any store failure and the idempotency key is reclaimed by TTL.
    pub fn trace(&self, request: &TraceRequest) -> Result<TraceReceipt, PipelineError> {
        let started = Instant::now();
        let result = self.trace_inner(request);
        self.metrics.record_latency(PlaneOp::Trace, started.elapsed());
        result
    }

    /// Executes the trace algorithm.
    fn trace_inner(&self, request: &TraceRequest) -> Result<TraceReceipt, PipelineError> {
        let now = self.clock.now();
        validate_trace_request(request, now)?;

        let agent = self.resolve_agent(request)?;
        let org = self
            .store
            .get_org(&request.org_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("org {}", request.org_id)))?;

        if let Some(key) = &request.idempotency_key {
            match self.store.begin_idempotent(&request.org_id, key, now)? {
                IdempotencyBegin::Started => {}
                IdempotencyBegin::Replayed(snapshot) => {
                    let mut receipt: TraceReceipt = serde_json::from_value(snapshot)
                        .map_err(|err| {
                            PipelineError::Store(StoreError::Corrupt(format!(
                                "idempotency snapshot: {err}"
                            )))
                        })?;
                    receipt.cached = true;
                    self.metrics.record_counter(PlaneCounter::TraceReplayed, 1);
                    self.record_trace_audit(request, &receipt);
                    return Ok(receipt);
                }
                IdempotencyBegin::InFlight => return Err(PipelineError::IdempotencyInFlight),
            }
        }

        let (run_id, create_run) = self.resolve_run(request, now)?;
        let write =
            build_trace_write(request, &agent, org.decision_limit, run_id, create_run, now);
        let receipt = TraceReceipt {
            decision_id: write.decision.id,
            run_id,
            event_count: 1 + u64::try_from(request.events.len()).unwrap_or(u64::MAX),
            cached: false,
        };
        let write = attach_snapshot(write, request.idempotency_key.clone(), &receipt);

        let outcome = self.store.create_trace(&write)?;
        debug_assert_eq!(outcome.decision_id, receipt.decision_id);

        self.outbox_wake.notify_one();
        self.offer_trace_events(request, &write, now);
        self.metrics.record_counter(PlaneCounter::TraceRecorded, 1);
        self.record_trace_audit(request, &receipt);
        Ok(receipt)
    }

    /// Looks up the agent and applies role gating.
    fn resolve_agent(&self, request: &TraceRequest) -> Result<Agent, PipelineError> {
        let agent = self
            .store
            .get_agent(&request.org_id, &request.agent)?
            .ok_or_else(|| PipelineError::NotFound(format!("agent {}", request.agent)))?;
        if !agent.role.can_trace() {
            return Err(PipelineError::PermissionDenied(format!(
                "role {} cannot trace",
                agent.role.as_str()
            )));
        }
        Ok(agent)
    }

    /// Resolves the run, creating an implicit one when the caller named none.
    fn resolve_run(
        &self,
        request: &TraceRequest,
        now: Timestamp,
    ) -> Result<(RunId, Option<AgentRun>), PipelineError> {
        if let Some(run_id) = request.run_id {
            self.store
                .get_run(&request.org_id, run_id)?
                .ok_or_else(|| PipelineError::NotFound(format!("run {run_id}")))?;
            return Ok((run_id, None));
        }
        let run = AgentRun {
            id: RunId::generate(),
            agent: request.agent.clone(),
            org_id: request.org_id.clone(),
            status: RunStatus::Running,
            parent_run_id: None,
            trace_id: None,
            started_at: now,
            completed_at: None,
        };
        Ok((run.id, Some(run)))
    }

    /// Offers the trace event and any caller events to the buffer.
    fn offer_trace_events(&self, request: &TraceRequest, write: &TraceWrite, now: Timestamp) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let run_id = write.decision.run_id;
        let service_event = AgentEvent {
            run_id,
            org_id: request.org_id.clone(),
            event_type: "decision_traced".to_string(),
            sequence_num: u64::try_from(now.unix_micros()).unwrap_or(u64::MAX),
            occurred_at: now,
            agent: request.agent.clone(),
            payload: serde_json::json!({
                "decision_id": write.decision.id,
                "decision_type": write.decision.decision_type,
            }),
        };
        buffer.offer(service_event);
        for draft in &request.events {
            buffer.offer(AgentEvent {
                run_id,
                org_id: request.org_id.clone(),
                event_type: draft.event_type.clone(),
                sequence_num: draft.sequence_num,
                occurred_at: now,
                agent: request.agent.clone(),
                payload: draft.payload.clone(),
            });
        }
    }

    /// Emits a trace audit record.
    fn record_trace_audit(&self, request: &TraceRequest, receipt: &TraceReceipt) {
        self.audit.record_trace(&TraceAuditEvent::new(
            request.org_id.clone(),
            request.agent.clone(),
            receipt.decision_id,
            receipt.run_id,
            request.decision.decision_type.clone(),
            receipt.cached,
        ));
    }

    /// Answers a precedent check from the current-decision view.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for validation or store failures.
    pub fn check(&self, request: &CheckRequest) -> Result<CheckResult, PipelineError> {
        let started = Instant::now();
        if request.decision_type.is_empty() {
            return Err(PipelineError::Validation("decision_type must not be empty".into()));
        }
        let limit = request.limit.unwrap_or(DEFAULT_CHECK_LIMIT).max(1);
        let decisions = self.store.list_current(
            &request.org_id,
            &request.decision_type,
            request.agent.as_ref(),
            limit,
        )?;
        let filter = ConflictFilter {
            decision_type: Some(request.decision_type.clone()),
            kind: None,
            agent: request.agent.clone(),
        };
        let conflicts = self.store.list_conflicts(&request.org_id, &filter, limit, 0)?;
        self.metrics.record_latency(PlaneOp::Check, started.elapsed());
        Ok(CheckResult {
            has_precedent: !decisions.is_empty(),
            decisions,
            conflicts: conflicts.items,
        })
    }

    /// Transitions a run to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] when the run does not exist.
    pub fn complete_run(
        &self,
        org_id: &OrgId,
        run_id: RunId,
        status: RunStatus,
    ) -> Result<(), PipelineError> {
        if status == RunStatus::Running {
            return Err(PipelineError::Validation(
                "completion status must be terminal".into(),
            ));
        }
        let now = self.clock.now();
        self.store.complete_run(org_id, run_id, status, now)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Trace Assembly
// ============================================================================

/// Validates a trace request against the current instant.
fn validate_trace_request(request: &TraceRequest, now: Timestamp) -> Result<(), PipelineError> {
    let draft = &request.decision;
    if draft.decision_type.is_empty() || draft.decision_type.len() > MAX_DECISION_TYPE_LENGTH {
        return Err(PipelineError::Validation(format!(
            "decision_type must be 1..={MAX_DECISION_TYPE_LENGTH} bytes"
        )));
    }
    if draft.outcome.is_empty() || draft.outcome.len() > MAX_OUTCOME_LENGTH {
        return Err(PipelineError::Validation(format!(
            "outcome must be 1..={MAX_OUTCOME_LENGTH} bytes"
        )));
    }
    if !draft.confidence.is_finite() || !(0.0..=1.0).contains(&draft.confidence) {
        return Err(PipelineError::Validation("confidence must be within [0, 1]".into()));
    }
    if let Some(valid_from) = draft.valid_from
        && valid_from.unix_micros() > now.unix_micros().saturating_add(MAX_FUTURE_SKEW_MICROS)
    {
        return Err(PipelineError::Validation("valid_from must not be in the future".into()));
    }
    for alternative in &request.alternatives {
        if alternative.label.is_empty() {
            return Err(PipelineError::Validation("alternative label must not be empty".into()));
        }
    }
    for evidence in &request.evidence {
        if evidence.source_type.is_empty() {
            return Err(PipelineError::Validation(
                "evidence source_type must not be empty".into(),
            ));
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    for event in &request.events {
        if event.event_type.is_empty() {
            return Err(PipelineError::Validation("event_type must not be empty".into()));
        }
        if !seen.insert(event.sequence_num) {
            return Err(PipelineError::Validation(format!(
                "duplicate event sequence_num {}",
                event.sequence_num
            )));
        }
    }
    Ok(())
}

/// Builds the fully-prepared trace write for the store transaction.
fn build_trace_write(
    request: &TraceRequest,
    agent: &Agent,
    quota_limit: u64,
    run_id: RunId,
    create_run: Option<AgentRun>,
    now: Timestamp,
) -> TraceWrite {
    let draft = &request.decision;
    let decision_id = DecisionId::generate();
    let valid_from = draft.valid_from.unwrap_or(now);
    let content_hash = compute_content_hash(&ContentHashFields {
        id: decision_id,
        decision_type: &draft.decision_type,
        outcome: &draft.outcome,
        confidence: draft.confidence,
        reasoning: draft.reasoning.as_deref(),
        valid_from,
    });
    let quality_score = score_quality(draft, request.alternatives.len(), request.evidence.len());
    let decision = Decision {
        id: decision_id,
        run_id,
        agent: agent.name.clone(),
        org_id: request.org_id.clone(),
        decision_type: draft.decision_type.clone(),
        outcome: draft.outcome.clone(),
        confidence: draft.confidence,
        reasoning: draft.reasoning.clone(),
        metadata: draft.metadata.clone(),
        embedding: draft.embedding.clone(),
        quality_score,
        precedent_ref: draft.precedent_ref,
        valid_from,
        valid_to: None,
        transaction_time: now,
        content_hash,
    };
    let alternatives = request
        .alternatives
        .iter()
        .map(|alt| Alternative {
            id: Uuid::new_v4(),
            decision_id,
            label: alt.label.clone(),
            score: alt.score,
            selected: alt.selected,
            rejection_reason: alt.rejection_reason.clone(),
            metadata: alt.metadata.clone(),
        })
        .collect();
    let evidence = request
        .evidence
        .iter()
        .map(|draft| Evidence {
            id: Uuid::new_v4(),
            decision_id,
            source_type: draft.source_type.clone(),
            source_uri: draft.source_uri.clone(),
            content: draft.content.clone(),
            relevance_score: draft.relevance_score,
            metadata: draft.metadata.clone(),
        })
        .collect();
    TraceWrite {
        org_id: request.org_id.clone(),
        agent: agent.name.clone(),
        create_run,
        decision,
        alternatives,
        evidence,
        idempotency: None,
        quota_limit,
        period: now.period(),
        now,
    }
}

/// Attaches the idempotency completion payload to a prepared write.
fn attach_snapshot(
    mut write: TraceWrite,
    key: Option<IdempotencyKey>,
    receipt: &TraceReceipt,
) -> TraceWrite {
    if let Some(key) = key
        && let Ok(snapshot) = serde_json::to_value(receipt)
    {
        write.idempotency = Some((key, snapshot));
    }
    write
}

/// Scores ingestion quality from payload completeness and confidence.
///
/// Reasoning, evidence, and alternatives each contribute a fixed share; the
/// remainder scales with confidence. The score is informational and never
/// gates ingestion.
fn score_quality(draft: &DecisionDraft, alternatives: usize, evidence: usize) -> f64 {
    let mut score = 0.4 * draft.confidence;
    if draft.reasoning.as_deref().is_some_and(|text| !text.is_empty()) {
        score += 0.2;
    }
    if evidence > 0 {
        score += 0.25;
    }
    if alternatives > 0 {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}
