// crates/akashi-core/src/interfaces/mod.rs
// ============================================================================
// Module: Akashi Interfaces
// Description: Backend-agnostic seams for storage, search, and telemetry.
// Purpose: Define the contract surfaces used by the decision plane runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the decision plane integrates with external systems
//! without embedding backend-specific details. The relational store and the
//! vector index are external collaborators reached only through these
//! traits; implementations must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod index;
pub mod stores;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use index::IndexError;
pub use index::IndexPoint;
pub use index::ScrollPage;
pub use index::VectorIndex;
pub use stores::AgentStore;
pub use stores::DecisionPlaneStore;
pub use stores::DecisionStore;
pub use stores::EventStore;
pub use stores::IdempotencyBegin;
pub use stores::IdempotencyStore;
pub use stores::OutboxStore;
pub use stores::ProofStore;
pub use stores::RunStore;
pub use stores::StoreError;
pub use stores::StoreHealth;
pub use stores::TraceOutcome;
pub use stores::TraceStore;
pub use stores::TraceWrite;
pub use stores::UsageStore;
pub use telemetry::AuditSink;
pub use telemetry::DeadLetterAuditEvent;
pub use telemetry::DrainAuditEvent;
pub use telemetry::MetricsSink;
pub use telemetry::NoopAuditSink;
pub use telemetry::NoopMetrics;
pub use telemetry::PlaneCounter;
pub use telemetry::PlaneGauge;
pub use telemetry::PlaneOp;
pub use telemetry::StderrAuditSink;
pub use telemetry::TraceAuditEvent;
