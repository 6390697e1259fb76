// crates/akashi-core/tests/registry.rs
// ============================================================================
// Module: Registry and Ledger Tests
// Description: Verifies API key handling, stats, and ledger sweeps.
// ============================================================================
//! ## Overview
//! Covers the agent registry primitives (key generation, hashing,
//! constant-time verification, role gates), the aggregate statistics the
//! health surface reads, and idempotency TTL reclamation through the
//! in-memory store.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use akashi_core::AgentName;
use akashi_core::AgentRole;
use akashi_core::AgentRun;
use akashi_core::ContentHashFields;
use akashi_core::Decision;
use akashi_core::DecisionId;
use akashi_core::DecisionStore;
use akashi_core::Evidence;
use akashi_core::IdempotencyKey;
use akashi_core::IdempotencyStore;
use akashi_core::InMemoryStore;
use akashi_core::OrgId;
use akashi_core::RunId;
use akashi_core::RunStatus;
use akashi_core::Timestamp;
use akashi_core::TraceStore;
use akashi_core::TraceWrite;
use akashi_core::compute_content_hash;
use akashi_core::generate_api_key;
use akashi_core::hash_api_key;
use akashi_core::verify_api_key;
use serde_json::json;
use uuid::Uuid;

#[test]
fn generated_keys_are_unique_and_verify_against_their_hash() {
    let first = generate_api_key();
    let second = generate_api_key();
    assert_ne!(first, second);
    assert!(first.starts_with("ak_"));

    let stored = hash_api_key(&first);
    assert_eq!(stored.len(), 64, "stored form is a sha-256 hex digest");
    assert_ne!(stored, first, "raw keys are never stored");
    assert!(verify_api_key(&first, &stored));
    assert!(!verify_api_key(&second, &stored));
    assert!(!verify_api_key(&first, &hash_api_key(&second)));
}

#[test]
fn roles_gate_write_access() {
    assert!(AgentRole::Admin.can_trace());
    assert!(AgentRole::Agent.can_trace());
    assert!(!AgentRole::Reader.can_trace());
    assert_eq!(AgentRole::Reader.as_str(), "reader");
}

#[test]
fn empty_org_stats_are_all_zero() {
    let store = InMemoryStore::new();
    let org = OrgId::new("org-1");
    let quality = store.decision_quality_stats(&org).expect("quality");
    assert_eq!(quality.total_decisions, 0);
    assert!((quality.average_confidence).abs() < 1e-12);

    let coverage = store.evidence_coverage_stats(&org).expect("coverage");
    assert_eq!(coverage.total_decisions, 0);
    assert!((coverage.coverage).abs() < 1e-12, "no decisions means zero coverage");
}

/// Builds a trace write with the given number of evidence rows.
fn evidenced_write(agent: &str, decision_type: &str, evidence_rows: usize) -> TraceWrite {
    let at = Timestamp::from_unix_micros(1_768_500_000_000_000);
    let decision_id = DecisionId::generate();
    let run = AgentRun {
        id: RunId::generate(),
        agent: AgentName::new(agent),
        org_id: OrgId::new("org-1"),
        status: RunStatus::Running,
        parent_run_id: None,
        trace_id: None,
        started_at: at,
        completed_at: None,
    };
    let content_hash = compute_content_hash(&ContentHashFields {
        id: decision_id,
        decision_type,
        outcome: "chosen",
        confidence: 0.6,
        reasoning: None,
        valid_from: at,
    });
    let evidence = (0 .. evidence_rows)
        .map(|index| Evidence {
            id: Uuid::new_v4(),
            decision_id,
            source_type: "doc".to_string(),
            source_uri: None,
            content: format!("citation {index}"),
            relevance_score: None,
            metadata: json!({}),
        })
        .collect();
    let run_id = run.id;
    TraceWrite {
        org_id: OrgId::new("org-1"),
        agent: AgentName::new(agent),
        create_run: Some(run),
        decision: Decision {
            id: decision_id,
            run_id,
            agent: AgentName::new(agent),
            org_id: OrgId::new("org-1"),
            decision_type: decision_type.to_string(),
            outcome: "chosen".to_string(),
            confidence: 0.6,
            reasoning: None,
            metadata: json!({}),
            embedding: None,
            quality_score: 0.5,
            precedent_ref: None,
            valid_from: at,
            valid_to: None,
            transaction_time: at,
            content_hash,
        },
        alternatives: Vec::new(),
        evidence,
        idempotency: None,
        quota_limit: 0,
        period: at.period(),
        now: at,
    }
}

#[test]
fn multi_evidence_decisions_count_once_in_coverage_stats() {
    let store = InMemoryStore::new();
    store.create_trace(&evidenced_write("a1", "db", 3)).expect("cited trace");
    store.create_trace(&evidenced_write("a2", "cache", 0)).expect("bare trace");

    let coverage = store.evidence_coverage_stats(&OrgId::new("org-1")).expect("coverage");
    assert_eq!(coverage.total_decisions, 2, "evidence fan-out must not inflate the total");
    assert_eq!(coverage.with_evidence, 1);
    assert!((coverage.coverage - 0.5).abs() < 1e-9);
}

#[test]
fn idempotency_ttl_reclamation_removes_expired_keys() {
    let store = InMemoryStore::new();
    let org = OrgId::new("org-1");
    let now = Timestamp::from_unix_micros(1_768_500_000_000_000);
    store.begin_idempotent(&org, &IdempotencyKey::new("short"), now).expect("begin");

    // In-progress keys live five minutes; nothing expires early.
    assert_eq!(store.sweep_idempotency_keys(now.plus_seconds(60)).expect("sweep"), 0);
    assert_eq!(
        store.sweep_idempotency_keys(now.plus_seconds(6 * 60)).expect("sweep"),
        1,
        "expired in-progress keys are reclaimed"
    );
    assert!(
        store.get_idempotent(&org, &IdempotencyKey::new("short")).expect("get").is_none()
    );
}
