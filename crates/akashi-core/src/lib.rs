// crates/akashi-core/src/lib.rs
// ============================================================================
// Module: Akashi Core Library
// Description: Public API surface for the Akashi decision plane.
// Purpose: Expose core types, interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Akashi is a decision audit service for AI agents: a bi-temporal,
//! content-addressed decision store with at-most-once trace ingestion,
//! contradiction detection, at-least-once vector-index synchronization, and
//! a bounded asynchronous event buffer. This crate holds the durable
//! decision plane; transports and SDKs integrate through the interfaces
//! rather than embedding here.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::AgentStore;
pub use interfaces::AuditSink;
pub use interfaces::DeadLetterAuditEvent;
pub use interfaces::DecisionPlaneStore;
pub use interfaces::DecisionStore;
pub use interfaces::DrainAuditEvent;
pub use interfaces::EventStore;
pub use interfaces::IdempotencyBegin;
pub use interfaces::IdempotencyStore;
pub use interfaces::IndexError;
pub use interfaces::IndexPoint;
pub use interfaces::MetricsSink;
pub use interfaces::NoopAuditSink;
pub use interfaces::NoopMetrics;
pub use interfaces::OutboxStore;
pub use interfaces::PlaneCounter;
pub use interfaces::PlaneGauge;
pub use interfaces::PlaneOp;
pub use interfaces::ProofStore;
pub use interfaces::RunStore;
pub use interfaces::ScrollPage;
pub use interfaces::StderrAuditSink;
pub use interfaces::StoreError;
pub use interfaces::StoreHealth;
pub use interfaces::TraceAuditEvent;
pub use interfaces::TraceOutcome;
pub use interfaces::TraceStore;
pub use interfaces::TraceWrite;
pub use interfaces::UsageStore;
pub use interfaces::VectorIndex;
pub use runtime::CheckRequest;
pub use runtime::CheckResult;
pub use runtime::ConflictRefresher;
pub use runtime::EventBuffer;
pub use runtime::EventBufferConfig;
pub use runtime::HealthService;
pub use runtime::HealthState;
pub use runtime::InMemoryStore;
pub use runtime::OutboxConfig;
pub use runtime::OutboxWorker;
pub use runtime::PipelineError;
pub use runtime::ReadinessReport;
pub use runtime::TracePipeline;
pub use runtime::TraceReceipt;
pub use runtime::TraceRequest;
