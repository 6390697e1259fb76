// crates/akashi-core/src/runtime/proofs.rs
// ============================================================================
// Module: Akashi Proof Builder
// Description: Periodic Merkle batch construction over stored hashes.
// Purpose: Persist batch-level tamper-evidence for transaction-time windows.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! A proof batch covers the content hashes of every revision recorded in a
//! transaction-time window. Leaves are sorted before the root is built, so
//! the proof is independent of query order and can be recomputed by any
//! auditor holding the same rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::BatchId;
use crate::core::merkle::IntegrityProof;
use crate::core::merkle::build_integrity_proof;
use crate::core::time::Timestamp;
use crate::interfaces::stores::ProofStore;
use crate::interfaces::stores::StoreError;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds and persists an integrity proof for a transaction-time window.
///
/// # Errors
///
/// Returns [`StoreError`] when the leaf query or the proof insert fails.
pub fn build_and_store_proof<S: ProofStore>(
    store: &S,
    range_start: Timestamp,
    range_end: Timestamp,
    now: Timestamp,
) -> Result<IntegrityProof, StoreError> {
    let leaves = store.content_hashes_in_window(range_start, range_end)?;
    let proof =
        build_integrity_proof(BatchId::generate(), leaves, range_start, range_end, now);
    store.put_proof(&proof)?;
    Ok(proof)
}
