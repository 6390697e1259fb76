// crates/akashi-core/src/interfaces/telemetry.rs
// ============================================================================
// Module: Decision Plane Telemetry
// Description: Observability hooks for the trace pipeline and workers.
// Purpose: Provide metric and audit seams without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module exposes thin metric and audit interfaces for the decision
//! plane. It is intentionally dependency-light so downstream deployments can
//! plug in Prometheus or OpenTelemetry without redesign. The stderr audit
//! sink emits one JSON object per line; no global logger exists anywhere in
//! the core.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::RunId;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gauge series exported by the decision plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaneGauge {
    /// Deliverable outbox entries (attempts below the maximum).
    OutboxDepth,
    /// Dead-lettered outbox entries awaiting operator review.
    DeadLetterCount,
    /// Events currently buffered in memory.
    BufferDepth,
}

impl PlaneGauge {
    /// Returns a stable label for the gauge.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutboxDepth => "outbox.depth",
            Self::DeadLetterCount => "outbox.dead_letters",
            Self::BufferDepth => "buffer.depth",
        }
    }
}

/// Counter series exported by the decision plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaneCounter {
    /// Events dropped by the buffer on overflow.
    BufferDropped,
    /// Events flushed to the store.
    BufferFlushed,
    /// Outbox entries delivered to the index.
    OutboxDelivered,
    /// Outbox entries that crossed into dead-letter state.
    OutboxDeadLettered,
    /// Traces recorded.
    TraceRecorded,
    /// Traces answered from an idempotency snapshot.
    TraceReplayed,
}

impl PlaneCounter {
    /// Returns a stable label for the counter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BufferDropped => "buffer.dropped",
            Self::BufferFlushed => "buffer.flushed",
            Self::OutboxDelivered => "outbox.delivered",
            Self::OutboxDeadLettered => "outbox.dead_lettered",
            Self::TraceRecorded => "trace.recorded",
            Self::TraceReplayed => "trace.replayed",
        }
    }
}

/// Operation classes with latency observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaneOp {
    /// Trace ingestion.
    Trace,
    /// Precedent check.
    Check,
    /// One outbox batch delivery.
    OutboxBatch,
    /// One conflict projection refresh.
    ConflictRefresh,
    /// One event buffer flush.
    EventFlush,
}

impl PlaneOp {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Check => "check",
            Self::OutboxBatch => "outbox_batch",
            Self::ConflictRefresh => "conflict_refresh",
            Self::EventFlush => "event_flush",
        }
    }
}

// ============================================================================
// SECTION: Metrics Trait
// ============================================================================

/// Metrics sink for the decision plane.
pub trait MetricsSink: Send + Sync {
    /// Records a gauge observation.
    fn record_gauge(&self, gauge: PlaneGauge, value: u64);
    /// Adds to a counter.
    fn record_counter(&self, counter: PlaneCounter, delta: u64);
    /// Records an operation latency.
    fn record_latency(&self, op: PlaneOp, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_gauge(&self, _gauge: PlaneGauge, _value: u64) {}

    fn record_counter(&self, _counter: PlaneCounter, _delta: u64) {}

    fn record_latency(&self, _op: PlaneOp, _latency: Duration) {}
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Audit record for one trace ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct TraceAuditEvent {
    /// Stable event discriminator.
    pub event: &'static str,
    /// Unix milliseconds when the event was emitted.
    pub timestamp_ms: u128,
    /// Owning organization.
    pub org_id: OrgId,
    /// Logical agent behind the trace.
    pub agent: AgentName,
    /// Recorded decision.
    pub decision_id: DecisionId,
    /// Run the decision belongs to.
    pub run_id: RunId,
    /// Decision type label.
    pub decision_type: String,
    /// Whether the response came from an idempotency snapshot.
    pub cached: bool,
}

impl TraceAuditEvent {
    /// Creates a trace audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        org_id: OrgId,
        agent: AgentName,
        decision_id: DecisionId,
        run_id: RunId,
        decision_type: String,
        cached: bool,
    ) -> Self {
        Self {
            event: "trace_audit",
            timestamp_ms: unix_millis_now(),
            org_id,
            agent,
            decision_id,
            run_id,
            decision_type,
            cached,
        }
    }
}

/// Audit record for an outbox entry crossing into dead-letter state.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterAuditEvent {
    /// Stable event discriminator.
    pub event: &'static str,
    /// Severity label; dead letters always warn.
    pub level: &'static str,
    /// Unix milliseconds when the event was emitted.
    pub timestamp_ms: u128,
    /// Outbox entry identifier.
    pub entry_id: i64,
    /// Decision the entry refers to.
    pub decision_id: DecisionId,
    /// Attempts consumed before dead-lettering.
    pub attempts: u32,
    /// Final delivery error.
    pub last_error: String,
}

impl DeadLetterAuditEvent {
    /// Creates a dead-letter audit event with a consistent timestamp.
    #[must_use]
    pub fn new(entry_id: i64, decision_id: DecisionId, attempts: u32, last_error: String) -> Self {
        Self {
            event: "dead_letter_audit",
            level: "warn",
            timestamp_ms: unix_millis_now(),
            entry_id,
            decision_id,
            attempts,
            last_error,
        }
    }
}

/// Audit record for a component drain during shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct DrainAuditEvent {
    /// Stable event discriminator.
    pub event: &'static str,
    /// Unix milliseconds when the event was emitted.
    pub timestamp_ms: u128,
    /// Component label.
    pub component: &'static str,
    /// Records flushed during the drain.
    pub flushed: u64,
    /// Records abandoned when the deadline passed.
    pub dropped: u64,
    /// Whether the drain hit its deadline before emptying.
    pub deadline_hit: bool,
}

impl DrainAuditEvent {
    /// Creates a drain audit event with a consistent timestamp.
    #[must_use]
    pub fn new(component: &'static str, flushed: u64, dropped: u64, deadline_hit: bool) -> Self {
        Self {
            event: "drain_audit",
            timestamp_ms: unix_millis_now(),
            component,
            flushed,
            dropped,
            deadline_hit,
        }
    }
}

/// Returns the current unix time in milliseconds.
fn unix_millis_now() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Audit Trait
// ============================================================================

/// Audit sink for decision plane events.
pub trait AuditSink: Send + Sync {
    /// Records a trace ingestion.
    fn record_trace(&self, _event: &TraceAuditEvent) {}

    /// Records a dead-letter transition.
    fn record_dead_letter(&self, _event: &DeadLetterAuditEvent) {}

    /// Records a shutdown drain outcome.
    fn record_drain(&self, _event: &DrainAuditEvent) {}
}

/// Audit sink that discards every event.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_trace(&self, event: &TraceAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_dead_letter(&self, event: &DeadLetterAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_drain(&self, event: &DrainAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}
