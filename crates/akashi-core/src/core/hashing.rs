// crates/akashi-core/src/core/hashing.rs
// ============================================================================
// Module: Akashi Content Hashing
// Description: Versioned SHA-256 content hashes for decision revisions.
// Purpose: Provide deterministic tamper-evidence for each stored revision.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Every decision revision carries a content hash over its identifying
//! fields. Hashes are versioned: the `v2:` prefix selects the length-prefixed
//! binary encoding, and its absence selects the legacy pipe-delimited v1
//! form. New writes always produce v2; the v1 verifier is kept so historic
//! rows remain checkable forever.
//!
//! Timestamps are truncated to microseconds before hashing. Database
//! timestamp columns round-trip at microsecond resolution, so a hash over
//! nanosecond input would never verify after a round trip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::DecisionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version prefix emitted by the current content hash encoding.
pub const CONTENT_HASH_V2_PREFIX: &str = "v2:";

// ============================================================================
// SECTION: Hash Input
// ============================================================================

/// Borrowed view of the fields covered by the content hash.
///
/// # Invariants
/// - `valid_from` is microsecond-truncated by construction of [`Timestamp`].
/// - `reasoning = None` and `reasoning = Some("")` hash identically.
#[derive(Debug, Clone, Copy)]
pub struct ContentHashFields<'a> {
    /// Decision revision identifier.
    pub id: DecisionId,
    /// Decision type label.
    pub decision_type: &'a str,
    /// Decision outcome label.
    pub outcome: &'a str,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional reasoning text.
    pub reasoning: Option<&'a str>,
    /// Valid-time start of the revision.
    pub valid_from: Timestamp,
}

// ============================================================================
// SECTION: Content Hash
// ============================================================================

/// Computes the current (v2) content hash for a decision revision.
///
/// The v2 encoding emits, for each field in fixed order {id canonical
/// string, decision type, outcome, confidence, valid-from, reasoning or
/// empty}, a 4-byte big-endian length prefix followed by the raw bytes.
#[must_use]
pub fn compute_content_hash(fields: &ContentHashFields<'_>) -> String {
    let mut hasher = Sha256::new();
    let id = fields.id.as_uuid().to_string();
    let confidence = format_confidence(fields.confidence);
    let valid_from = fields.valid_from.to_rfc3339_micros();
    let reasoning = fields.reasoning.unwrap_or_default();
    for part in [
        id.as_str(),
        fields.decision_type,
        fields.outcome,
        confidence.as_str(),
        valid_from.as_str(),
        reasoning,
    ] {
        let bytes = part.as_bytes();
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        hasher.update(len.to_be_bytes());
        hasher.update(bytes);
    }
    let digest = hasher.finalize();
    format!("{CONTENT_HASH_V2_PREFIX}{}", hex_encode(&digest))
}

/// Computes the legacy (v1) pipe-delimited content hash.
///
/// Kept verbatim so revisions written before the v2 rollout remain
/// verifiable. Never used for new writes.
#[must_use]
pub fn compute_content_hash_v1(fields: &ContentHashFields<'_>) -> String {
    let encoded = format!(
        "{}|{}|{}|{}|{}|{}",
        fields.id.as_uuid(),
        fields.decision_type,
        fields.outcome,
        format_confidence(fields.confidence),
        fields.reasoning.unwrap_or_default(),
        fields.valid_from.to_rfc3339_micros(),
    );
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Verifies a stored content hash against the revision fields.
///
/// Dispatches on the `v2:` prefix; hashes without a version prefix are
/// checked with the legacy v1 algorithm.
#[must_use]
pub fn verify_content_hash(fields: &ContentHashFields<'_>, stored: &str) -> bool {
    if stored.starts_with(CONTENT_HASH_V2_PREFIX) {
        compute_content_hash(fields) == stored
    } else {
        compute_content_hash_v1(fields) == stored
    }
}

/// Formats confidence as fixed-point with ten fractional digits at 32-bit
/// precision, matching the stored hash encoding.
#[must_use]
pub fn format_confidence(confidence: f64) -> String {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "The hash format reduces confidence to 32-bit precision by definition."
    )]
    let narrowed = confidence as f32;
    format!("{narrowed:.10}")
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
