// crates/akashi-index/src/lib.rs
// ============================================================================
// Module: Akashi Index Library
// Description: Vector index clients for the search outbox worker.
// Purpose: Expose the HTTP client and the in-memory test double.
// Dependencies: crate::{http, memory}
// ============================================================================

//! ## Overview
//! Implementations of the [`akashi_core::VectorIndex`] contract: an HTTP
//! client for a points-style REST API with fail-closed limits, and an
//! in-memory index with fault injection for worker tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod memory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpIndexConfig;
pub use http::HttpVectorIndex;
pub use memory::InMemoryVectorIndex;
