// crates/akashi-core/src/runtime/mod.rs
// ============================================================================
// Module: Akashi Runtime
// Description: Trace pipeline, background workers, and in-memory stores.
// Purpose: Execute the decision plane over the interface seams.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! The runtime wires the decision plane together: the trace pipeline is the
//! canonical ingestion path, and three background workers (event flusher,
//! outbox worker, conflict refresher) run as tokio tasks owning a shutdown
//! signal. Everything is generic over the store seams so the in-memory store
//! can stand in for the SQLite gateway in tests.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod buffer;
pub mod conflicts;
pub mod health;
pub mod memory;
pub mod outbox;
pub mod pipeline;
pub mod proofs;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use buffer::DrainOutcome;
pub use buffer::EventBuffer;
pub use buffer::EventBufferConfig;
pub use conflicts::ConflictRefresher;
pub use conflicts::DEFAULT_REFRESH_INTERVAL;
pub use health::HealthService;
pub use health::HealthState;
pub use health::ReadinessReport;
pub use memory::InMemoryStore;
pub use outbox::BatchReport;
pub use outbox::OutboxConfig;
pub use outbox::OutboxWorker;
pub use outbox::backoff_seconds;
pub use pipeline::CheckRequest;
pub use pipeline::CheckResult;
pub use pipeline::PipelineError;
pub use pipeline::TraceEventDraft;
pub use pipeline::TracePipeline;
pub use pipeline::TraceReceipt;
pub use pipeline::TraceRequest;
pub use proofs::build_and_store_proof;
