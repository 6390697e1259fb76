// crates/akashi-core/src/core/usage.rs
// ============================================================================
// Module: Akashi Usage Ledger Records
// Description: Per-organization monthly decision counters.
// Purpose: Define the quota synchronization point for trace ingestion.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Usage counters are keyed by `(org, YYYY-MM)` and incremented atomically
//! inside the trace transaction. The per-period row is the synchronization
//! point for quota enforcement: the increment happens in the same
//! transaction as the decision insert, so concurrent traces can never race
//! past the limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::OrgId;

// ============================================================================
// SECTION: Usage Counter
// ============================================================================

/// Monthly decision counter for one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Owning organization.
    pub org_id: OrgId,
    /// Usage period in `YYYY-MM` form.
    pub period: String,
    /// Decisions recorded in the period.
    pub decision_count: u64,
}
