// crates/akashi-core/src/core/agent.rs
// ============================================================================
// Module: Akashi Organizations and Agents
// Description: Tenant records, agent registry entries, and role gates.
// Purpose: Define ownership, write-access roles, and API key verification.
// Dependencies: rand, serde, sha2, subtle
// ============================================================================

//! ## Overview
//! Organizations own every other record transitively. Agents are registry
//! entries scoped to one organization; their role gates write access to the
//! trace pipeline. API keys are stored as SHA-256 hashes and verified in
//! constant time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::core::hashing::hex_encode;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::OrgId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Organization
// ============================================================================

/// Subscription plan for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free tier.
    #[default]
    Free,
    /// Paid professional tier.
    Pro,
    /// Enterprise tier.
    Enterprise,
}

impl Plan {
    /// Returns a stable label for the plan.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

/// Tenant record owning all other entities.
///
/// # Invariants
/// - Quota limits of `0` mean unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrgId,
    /// Subscription plan.
    pub plan: Plan,
    /// Monthly decision quota; `0` disables enforcement.
    pub decision_limit: u64,
    /// Registered agent quota; `0` disables enforcement.
    pub agent_limit: u64,
    /// External billing customer reference.
    pub stripe_customer_id: Option<String>,
    /// External billing subscription reference.
    pub stripe_subscription_id: Option<String>,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Agent Registry
// ============================================================================

/// Access role granted to an agent credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Full administrative access; seeded on first boot.
    Admin,
    /// Standard agent: may trace and query.
    Agent,
    /// Read-only access: may query but never trace.
    Reader,
}

impl AgentRole {
    /// Returns a stable label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::Reader => "reader",
        }
    }

    /// Returns whether the role may record decisions.
    #[must_use]
    pub const fn can_trace(self) -> bool {
        matches!(self, Self::Admin | Self::Agent)
    }
}

/// Registry entry for one agent credential.
///
/// # Invariants
/// - `name` is unique within `org_id`.
/// - `api_key_hash` is a lowercase hex SHA-256 digest; raw keys are never
///   stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Agent row identifier.
    pub id: AgentId,
    /// Logical agent name, unique per organization.
    pub name: AgentName,
    /// Owning organization.
    pub org_id: OrgId,
    /// Access role.
    pub role: AgentRole,
    /// SHA-256 hash of the API key.
    pub api_key_hash: String,
    /// Free-form metadata.
    pub metadata: Value,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: API Keys
// ============================================================================

/// Generates a fresh random API key.
///
/// The key is returned to the caller exactly once; only its hash persists.
#[must_use]
pub fn generate_api_key() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("ak_{}", hex_encode(&bytes))
}

/// Hashes an API key for storage.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Verifies an API key against a stored hash in constant time.
#[must_use]
pub fn verify_api_key(key: &str, stored_hash: &str) -> bool {
    let computed = hash_api_key(key);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
