// crates/akashi-core/src/core/merkle.rs
// ============================================================================
// Module: Akashi Merkle Batches
// Description: Merkle root construction over sorted content hashes.
// Purpose: Provide batch-level tamper-evidence for decision windows.
// Dependencies: serde, sha2
// ============================================================================

//! ## Overview
//! Integrity proofs cover a window of decision revisions with a single Merkle
//! root built over the sorted content hashes in that window. Internal nodes
//! are domain-separated from leaves with a `0x01` byte and the left child is
//! length-prefixed, so `hash_pair("ab", "c")` can never collide with
//! `hash_pair("a", "bc")`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::core::hashing::hex_encode;
use crate::core::identifiers::BatchId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Merkle Root
// ============================================================================

/// Builds a Merkle root over an ordered list of hex-encoded leaf hashes.
///
/// Returns the empty string for no leaves and the leaf verbatim for a single
/// leaf. An unpaired trailing node is hashed against itself. Determinism
/// across callers requires the leaves to be sorted lexicographically before
/// calling.
#[must_use]
pub fn build_merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return String::new();
    }
    let mut level: Vec<String> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash_pair(left, right));
        }
        level = next;
    }
    level.swap_remove(0)
}

/// Hashes an internal Merkle node.
///
/// The `0x01` domain separator prevents collisions with leaf hashes; the
/// length prefix on the left child prevents boundary ambiguity.
fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    let len = u32::try_from(left.len()).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex_encode(&hasher.finalize())
}

// ============================================================================
// SECTION: Integrity Proof
// ============================================================================

/// Batch-level tamper-evidence record for a transaction-time window.
///
/// # Invariants
/// - `root_hash` is the Merkle root over the sorted content hashes of every
///   revision whose transaction time falls in `[range_start, range_end)`.
/// - `leaf_count` equals the number of hashes covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityProof {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// Merkle root over the covered hashes.
    pub root_hash: String,
    /// Number of leaves covered by the root.
    pub leaf_count: u64,
    /// Inclusive start of the covered transaction-time window.
    pub range_start: Timestamp,
    /// Exclusive end of the covered transaction-time window.
    pub range_end: Timestamp,
    /// Instant the proof was built.
    pub created_at: Timestamp,
}

/// Builds an integrity proof from the content hashes in a window.
///
/// Sorts the leaves lexicographically before building the root so the proof
/// is independent of query order.
#[must_use]
pub fn build_integrity_proof(
    batch_id: BatchId,
    mut leaves: Vec<String>,
    range_start: Timestamp,
    range_end: Timestamp,
    created_at: Timestamp,
) -> IntegrityProof {
    leaves.sort_unstable();
    let leaf_count = u64::try_from(leaves.len()).unwrap_or(u64::MAX);
    IntegrityProof {
        batch_id,
        root_hash: build_merkle_root(&leaves),
        leaf_count,
        range_start,
        range_end,
        created_at,
    }
}
