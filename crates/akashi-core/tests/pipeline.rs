// crates/akashi-core/tests/pipeline.rs
// ============================================================================
// Module: Trace Pipeline Tests
// Description: Verifies at-most-once ingestion, supersession, and quotas.
// ============================================================================
//! ## Overview
//! Exercises the canonical trace algorithm against the in-memory store:
//! idempotent replay under sequential and concurrent use, bi-temporal
//! supersession, transactional quota enforcement, validation and role
//! gating, and precedent checks.

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

use std::sync::Arc;
use std::thread;

use akashi_core::Agent;
use akashi_core::AgentId;
use akashi_core::AgentName;
use akashi_core::AgentRole;
use akashi_core::AgentStore;
use akashi_core::Clock;
use akashi_core::ConflictKind;
use akashi_core::DecisionDraft;
use akashi_core::DecisionStore;
use akashi_core::IdempotencyKey;
use akashi_core::InMemoryStore;
use akashi_core::ManualClock;
use akashi_core::NoopAuditSink;
use akashi_core::NoopMetrics;
use akashi_core::OrgId;
use akashi_core::Organization;
use akashi_core::Plan;
use akashi_core::RunStatus;
use akashi_core::RunStore;
use akashi_core::Timestamp;
use akashi_core::TracePipeline;
use akashi_core::TraceRequest;
use akashi_core::UsageStore;
use akashi_core::hash_api_key;
use akashi_core::runtime::CheckRequest;
use akashi_core::runtime::PipelineError;
use serde_json::json;
use tokio::sync::Notify;

const START_MICROS: i64 = 1_768_500_000_000_000;

fn seed_store(store: &InMemoryStore, decision_limit: u64) {
    let now = Timestamp::from_unix_micros(START_MICROS);
    store
        .put_org(&Organization {
            id: OrgId::new("org-1"),
            plan: Plan::Pro,
            decision_limit,
            agent_limit: 0,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
        })
        .expect("seed org");
    for (name, role) in
        [("a1", AgentRole::Agent), ("a2", AgentRole::Agent), ("viewer", AgentRole::Reader)]
    {
        store
            .put_agent(&Agent {
                id: AgentId::generate(),
                name: AgentName::new(name),
                org_id: OrgId::new("org-1"),
                role,
                api_key_hash: hash_api_key("test-key"),
                metadata: json!({}),
                created_at: now,
            })
            .expect("seed agent");
    }
}

fn build(
    decision_limit: u64,
) -> (Arc<InMemoryStore>, Arc<ManualClock>, TracePipeline<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    seed_store(&store, decision_limit);
    let clock = ManualClock::starting_at(Timestamp::from_unix_micros(START_MICROS));
    let pipeline = TracePipeline::new(
        Arc::clone(&store),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(NoopAuditSink),
        Arc::new(NoopMetrics),
        None,
        Arc::new(Notify::new()),
    );
    (store, clock, pipeline)
}

fn request(agent: &str, decision_type: &str, outcome: &str) -> TraceRequest {
    TraceRequest {
        org_id: OrgId::new("org-1"),
        agent: AgentName::new(agent),
        run_id: None,
        decision: DecisionDraft {
            decision_type: decision_type.to_string(),
            outcome: outcome.to_string(),
            confidence: 0.8,
            reasoning: Some("observed latency".to_string()),
            metadata: json!({}),
            embedding: None,
            precedent_ref: None,
            valid_from: None,
        },
        alternatives: Vec::new(),
        evidence: Vec::new(),
        events: Vec::new(),
        idempotency_key: None,
    }
}

#[test]
fn trace_records_decision_with_implicit_run() {
    let (store, _clock, pipeline) = build(0);
    let receipt = pipeline.trace(&request("a1", "db", "postgres")).expect("trace");
    assert!(!receipt.cached);
    assert_eq!(receipt.event_count, 1);

    let run = store.get_run(&OrgId::new("org-1"), receipt.run_id).expect("run").expect("exists");
    assert_eq!(run.status, RunStatus::Running);

    let decision = store
        .current_decision(&OrgId::new("org-1"), &AgentName::new("a1"), "db")
        .expect("query")
        .expect("current");
    assert_eq!(decision.id, receipt.decision_id);
    assert_eq!(decision.outcome, "postgres");
    assert!(decision.content_hash.starts_with("v2:"));
    assert!(decision.is_current());

    let now = Timestamp::from_unix_micros(START_MICROS);
    let used = store.usage(&OrgId::new("org-1"), &now.period()).expect("usage");
    assert_eq!(used, 1);
}

#[test]
fn idempotent_replay_returns_cached_receipt() {
    let (store, _clock, pipeline) = build(0);
    let mut req = request("a1", "db", "postgres");
    req.idempotency_key = Some(IdempotencyKey::new("K"));

    let first = pipeline.trace(&req).expect("first trace");
    let second = pipeline.trace(&req).expect("replayed trace");
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.decision_id, second.decision_id);
    assert_eq!(first.run_id, second.run_id);
    assert_eq!(second.event_count, 1);

    let recent = store.recent_decisions(&OrgId::new("org-1"), 10).expect("recent");
    assert_eq!(recent.len(), 1, "replay must not write a second decision");
}

#[test]
fn concurrent_traces_with_one_key_produce_one_decision() {
    let (store, _clock, pipeline) = build(0);
    let pipeline = Arc::new(pipeline);
    let mut handles = Vec::new();
    for _ in 0 .. 4 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(thread::spawn(move || {
            let mut req = request("a1", "db", "postgres");
            req.idempotency_key = Some(IdempotencyKey::new("K"));
            pipeline.trace(&req)
        }));
    }
    let mut fresh = 0;
    let mut decision_ids = Vec::new();
    for handle in handles {
        match handle.join().expect("join") {
            Ok(receipt) => {
                if !receipt.cached {
                    fresh += 1;
                }
                decision_ids.push(receipt.decision_id);
            }
            Err(PipelineError::IdempotencyInFlight) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(fresh <= 1, "at most one caller wins the key");
    decision_ids.dedup();
    assert!(decision_ids.len() <= 1, "all winners observe the same decision");
    let recent = store.recent_decisions(&OrgId::new("org-1"), 10).expect("recent");
    assert_eq!(recent.len(), 1);
}

#[test]
fn supersession_closes_the_prior_revision() {
    let (store, clock, pipeline) = build(0);
    let first = pipeline.trace(&request("a1", "db", "postgres")).expect("first");
    clock.advance_micros(1_000_000);
    let second = pipeline.trace(&request("a1", "db", "mysql")).expect("second");

    let org = OrgId::new("org-1");
    let old = store.get_decision(&org, first.decision_id).expect("get").expect("exists");
    let new = store.get_decision(&org, second.decision_id).expect("get").expect("exists");
    assert!(!old.is_current());
    assert!(new.is_current());
    assert_eq!(old.valid_to, Some(new.valid_from), "revisions must chain");

    let current =
        store.current_decision(&org, &AgentName::new("a1"), "db").expect("query").expect("one");
    assert_eq!(current.id, second.decision_id, "exactly one current revision per key");
}

#[test]
fn quota_rejects_after_limit_is_reached() {
    let (_store, clock, pipeline) = build(2);
    pipeline.trace(&request("a1", "t1", "x")).expect("first");
    clock.advance_micros(1);
    pipeline.trace(&request("a1", "t2", "y")).expect("second");
    clock.advance_micros(1);
    let denied = pipeline.trace(&request("a1", "t3", "z"));
    match denied {
        Err(PipelineError::QuotaExceeded {
            limit,
            count,
        }) => {
            assert_eq!(limit, 2);
            assert_eq!(count, 2);
        }
        other => panic!("expected quota_exceeded, got {other:?}"),
    }
}

#[test]
fn concurrent_traces_never_race_past_the_quota() {
    let (store, _clock, pipeline) = build(2);
    pipeline.trace(&request("a1", "seed", "x")).expect("seed trace");
    let pipeline = Arc::new(pipeline);
    let mut handles = Vec::new();
    for index in 0 .. 2 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(thread::spawn(move || {
            pipeline.trace(&request("a2", &format!("race-{index}"), "y"))
        }));
    }
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();
    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let quota_failures = outcomes
        .iter()
        .filter(|outcome| {
            matches!(
                outcome,
                Err(PipelineError::QuotaExceeded { .. })
            )
        })
        .count();
    assert_eq!(successes, 1, "exactly one concurrent trace wins the last slot");
    assert_eq!(quota_failures, 1);

    let now = Timestamp::from_unix_micros(START_MICROS);
    let used = store.usage(&OrgId::new("org-1"), &now.period()).expect("usage");
    assert_eq!(used, 2, "counter must land exactly on the limit");
}

#[test]
fn validation_rejects_bad_payloads() {
    let (_store, _clock, pipeline) = build(0);

    let mut empty_type = request("a1", "", "x");
    empty_type.decision.decision_type = String::new();
    assert!(matches!(pipeline.trace(&empty_type), Err(PipelineError::Validation(_))));

    let mut bad_confidence = request("a1", "db", "x");
    bad_confidence.decision.confidence = 1.5;
    assert!(matches!(pipeline.trace(&bad_confidence), Err(PipelineError::Validation(_))));

    let mut nan_confidence = request("a1", "db", "x");
    nan_confidence.decision.confidence = f64::NAN;
    assert!(matches!(pipeline.trace(&nan_confidence), Err(PipelineError::Validation(_))));

    let mut future = request("a1", "db", "x");
    future.decision.valid_from =
        Some(Timestamp::from_unix_micros(START_MICROS + 60_000_000));
    assert!(
        matches!(pipeline.trace(&future), Err(PipelineError::Validation(_))),
        "future valid_from is rejected"
    );
}

#[test]
fn reader_role_cannot_trace() {
    let (_store, _clock, pipeline) = build(0);
    let denied = pipeline.trace(&request("viewer", "db", "x"));
    assert!(matches!(denied, Err(PipelineError::PermissionDenied(_))));
}

#[test]
fn unknown_agent_and_run_are_not_found() {
    let (_store, _clock, pipeline) = build(0);
    let ghost = pipeline.trace(&request("ghost", "db", "x"));
    assert!(matches!(ghost, Err(PipelineError::NotFound(_))));

    let mut missing_run = request("a1", "db", "x");
    missing_run.run_id = Some(akashi_core::RunId::generate());
    assert!(matches!(pipeline.trace(&missing_run), Err(PipelineError::NotFound(_))));
}

#[test]
fn check_reports_precedents_and_conflicts() {
    let (store, clock, pipeline) = build(0);
    let empty = pipeline
        .check(&CheckRequest {
            org_id: OrgId::new("org-1"),
            decision_type: "db".to_string(),
            agent: None,
            limit: None,
        })
        .expect("check");
    assert!(!empty.has_precedent);

    pipeline.trace(&request("a1", "db", "postgres")).expect("a1 trace");
    clock.advance_micros(1);
    pipeline.trace(&request("a2", "db", "mysql")).expect("a2 trace");
    store.refresh_conflicts(clock.now()).expect("refresh");

    let result = pipeline
        .check(&CheckRequest {
            org_id: OrgId::new("org-1"),
            decision_type: "db".to_string(),
            agent: None,
            limit: None,
        })
        .expect("check");
    assert!(result.has_precedent);
    assert_eq!(result.decisions.len(), 2);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].kind, ConflictKind::CrossAgent);
}

#[test]
fn complete_run_requires_a_terminal_status() {
    let (store, _clock, pipeline) = build(0);
    let receipt = pipeline.trace(&request("a1", "db", "postgres")).expect("trace");
    let org = OrgId::new("org-1");

    let invalid = pipeline.complete_run(&org, receipt.run_id, RunStatus::Running);
    assert!(matches!(invalid, Err(PipelineError::Validation(_))));

    pipeline.complete_run(&org, receipt.run_id, RunStatus::Completed).expect("complete");
    let run = store.get_run(&org, receipt.run_id).expect("run").expect("exists");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.completed_at.is_some());
}
