// crates/akashi-store-sqlite/src/lib.rs
// ============================================================================
// Module: Akashi SQLite Store Library
// Description: Public API surface for the SQLite decision plane store.
// Purpose: Expose the store gateway, its configuration, and its errors.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Durable [`akashi_core::DecisionPlaneStore`] implementation backed by
//! `SQLite` WAL. One writer connection executes every coarse mutation as an
//! immediate transaction; a pool of read connections serves queries. See
//! [`store`] for schema and locking details.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
