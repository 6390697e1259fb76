// crates/akashi-core/src/core/mod.rs
// ============================================================================
// Module: Akashi Core Types
// Description: Canonical Akashi domain records and integrity primitives.
// Purpose: Provide stable, serializable types for the decision plane.
// Dependencies: serde, sha2, time, uuid
// ============================================================================

//! ## Overview
//! Akashi core types define the bi-temporal decision model, run and event
//! records, the idempotency and usage ledgers, the outbox queue, and the
//! integrity kernel. These types are the canonical source of truth for any
//! derived API surfaces (HTTP, MCP, or SDKs).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod agent;
pub mod conflict;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod idempotency;
pub mod merkle;
pub mod outbox;
pub mod run;
pub mod time;
pub mod usage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use agent::Agent;
pub use agent::AgentRole;
pub use agent::Organization;
pub use agent::Plan;
pub use agent::generate_api_key;
pub use agent::hash_api_key;
pub use agent::verify_api_key;
pub use conflict::Conflict;
pub use conflict::ConflictFilter;
pub use conflict::ConflictKind;
pub use conflict::ConflictPage;
pub use decision::Alternative;
pub use decision::AlternativeDraft;
pub use decision::Decision;
pub use decision::DecisionDraft;
pub use decision::DecisionQualityStats;
pub use decision::Evidence;
pub use decision::EvidenceCoverageStats;
pub use decision::EvidenceDraft;
pub use hashing::CONTENT_HASH_V2_PREFIX;
pub use hashing::ContentHashFields;
pub use hashing::compute_content_hash;
pub use hashing::compute_content_hash_v1;
pub use hashing::format_confidence;
pub use hashing::hex_encode;
pub use hashing::verify_content_hash;
pub use identifiers::AgentId;
pub use identifiers::AgentName;
pub use identifiers::BatchId;
pub use identifiers::DecisionId;
pub use identifiers::IdempotencyKey;
pub use identifiers::OrgId;
pub use identifiers::RunId;
pub use idempotency::IdempotencyRecord;
pub use idempotency::IdempotencyState;
pub use merkle::IntegrityProof;
pub use merkle::build_integrity_proof;
pub use merkle::build_merkle_root;
pub use outbox::OutboxEntry;
pub use outbox::OutboxOperation;
pub use run::AgentEvent;
pub use run::AgentRun;
pub use run::RunStatus;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use time::Timestamp;
pub use usage::UsageCounter;
