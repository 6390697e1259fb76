// crates/akashi-core/tests/conflicts_health.rs
// ============================================================================
// Module: Conflict Detector and Health Surface Tests
// Description: Verifies conflict derivation, refresh freshness, readiness.
// ============================================================================
//! ## Overview
//! Exercises the conflict projection: cross-agent pairs listed once per
//! unordered pair, self-contradictions against the most recent prior
//! revision, filters and pagination; and the health surface combining store
//! reachability with worker freshness budgets.

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
use std::time::Duration;

use akashi_core::Agent;
use akashi_core::AgentId;
use akashi_core::AgentName;
use akashi_core::AgentRole;
use akashi_core::AgentStore;
use akashi_core::Clock;
use akashi_core::ConflictFilter;
use akashi_core::ConflictKind;
use akashi_core::ConflictRefresher;
use akashi_core::DecisionDraft;
use akashi_core::DecisionStore;
use akashi_core::HealthService;
use akashi_core::HealthState;
use akashi_core::InMemoryStore;
use akashi_core::ManualClock;
use akashi_core::NoopAuditSink;
use akashi_core::NoopMetrics;
use akashi_core::OrgId;
use akashi_core::Organization;
use akashi_core::Plan;
use akashi_core::Timestamp;
use akashi_core::TracePipeline;
use akashi_core::TraceRequest;
use akashi_core::hash_api_key;
use serde_json::json;
use tokio::sync::Notify;

const START_MICROS: i64 = 1_768_500_000_000_000;

fn seeded() -> (Arc<InMemoryStore>, Arc<ManualClock>, TracePipeline<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let now = Timestamp::from_unix_micros(START_MICROS);
    store
        .put_org(&Organization {
            id: OrgId::new("org-1"),
            plan: Plan::Free,
            decision_limit: 0,
            agent_limit: 0,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
        })
        .expect("seed org");
    for name in ["a1", "a2", "a3"] {
        store
            .put_agent(&Agent {
                id: AgentId::generate(),
                name: AgentName::new(name),
                org_id: OrgId::new("org-1"),
                role: AgentRole::Agent,
                api_key_hash: hash_api_key("test-key"),
                metadata: json!({}),
                created_at: now,
            })
            .expect("seed agent");
    }
    let clock = ManualClock::starting_at(now);
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
            confidence: 0.7,
            reasoning: None,
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
fn cross_agent_disagreement_surfaces_once_per_pair() {
    let (store, clock, pipeline) = seeded();
    let a1 = pipeline.trace(&request("a1", "db", "postgres")).expect("a1");
    clock.advance_micros(1);
    let a2 = pipeline.trace(&request("a2", "db", "mysql")).expect("a2");
    store.refresh_conflicts(clock.now()).expect("refresh");

    let org = OrgId::new("org-1");
    let page = store
        .list_conflicts(&org, &ConflictFilter::default(), 10, 0)
        .expect("list");
    assert_eq!(page.total, 1, "one unordered pair, one listing");
    let conflict = &page.items[0];
    assert_eq!(conflict.kind, ConflictKind::CrossAgent);
    let ids = [conflict.decision_a, conflict.decision_b];
    assert!(ids.contains(&a1.decision_id) && ids.contains(&a2.decision_id));
    assert_ne!(conflict.agent_a, conflict.agent_b);

    // Symmetry: filtering by either agent finds the same conflict.
    for agent in ["a1", "a2"] {
        let filtered = store
            .list_conflicts(
                &org,
                &ConflictFilter {
                    agent: Some(AgentName::new(agent)),
                    ..ConflictFilter::default()
                },
                10,
                0,
            )
            .expect("filtered list");
        assert_eq!(filtered.total, 1, "conflict is visible from both sides");
    }
}

#[test]
fn agreeing_agents_do_not_conflict() {
    let (store, clock, pipeline) = seeded();
    pipeline.trace(&request("a1", "db", "postgres")).expect("a1");
    clock.advance_micros(1);
    pipeline.trace(&request("a2", "db", "postgres")).expect("a2");
    store.refresh_conflicts(clock.now()).expect("refresh");

    let count = store
        .count_conflicts(&OrgId::new("org-1"), &ConflictFilter::default())
        .expect("count");
    assert_eq!(count, 0);
}

#[test]
fn self_contradiction_uses_the_most_recent_prior_revision() {
    let (store, clock, pipeline) = seeded();
    pipeline.trace(&request("a1", "db", "postgres")).expect("first");
    clock.advance_micros(1_000_000);
    pipeline.trace(&request("a1", "db", "sqlite")).expect("second");
    clock.advance_micros(1_000_000);
    let third = pipeline.trace(&request("a1", "db", "mysql")).expect("third");
    store.refresh_conflicts(clock.now()).expect("refresh");

    let org = OrgId::new("org-1");
    let page = store
        .list_conflicts(
            &org,
            &ConflictFilter {
                kind: Some(ConflictKind::SelfContradiction),
                ..ConflictFilter::default()
            },
            10,
            0,
        )
        .expect("list");
    assert_eq!(page.total, 1, "only the most recent prior revision is compared");
    let conflict = &page.items[0];
    assert_eq!(conflict.decision_a, third.decision_id);
    assert_eq!(conflict.outcome_b, "sqlite", "compared against the immediate predecessor");
    assert_eq!(conflict.agent_a, conflict.agent_b);
}

#[test]
fn conflict_filters_and_pagination_apply() {
    let (store, clock, pipeline) = seeded();
    pipeline.trace(&request("a1", "db", "postgres")).expect("trace");
    clock.advance_micros(1);
    pipeline.trace(&request("a2", "db", "mysql")).expect("trace");
    clock.advance_micros(1);
    pipeline.trace(&request("a3", "db", "cockroach")).expect("trace");
    clock.advance_micros(1);
    pipeline.trace(&request("a1", "cache", "redis")).expect("trace");
    clock.advance_micros(1);
    pipeline.trace(&request("a2", "cache", "memcached")).expect("trace");
    store.refresh_conflicts(clock.now()).expect("refresh");

    let org = OrgId::new("org-1");
    // Three agents disagreeing pairwise on `db` yields three pairs, plus one
    // pair on `cache`.
    let all = store.list_conflicts(&org, &ConflictFilter::default(), 10, 0).expect("list");
    assert_eq!(all.total, 4);

    let db_only = store
        .list_conflicts(
            &org,
            &ConflictFilter {
                decision_type: Some("db".to_string()),
                ..ConflictFilter::default()
            },
            10,
            0,
        )
        .expect("list");
    assert_eq!(db_only.total, 3);

    let first_page = store
        .list_conflicts(&org, &ConflictFilter::default(), 3, 0)
        .expect("page one");
    assert_eq!(first_page.items.len(), 3);
    assert_eq!(first_page.total, 4);
    let second_page = store
        .list_conflicts(&org, &ConflictFilter::default(), 3, 3)
        .expect("page two");
    assert_eq!(second_page.items.len(), 1);
}

#[test]
fn refresher_records_freshness_only_on_success() {
    let (store, clock, _pipeline) = seeded();
    let health = HealthState::new();
    let refresher = ConflictRefresher::new(
        Arc::clone(&store),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&health),
        Arc::new(NoopMetrics),
        Duration::from_secs(30),
    );
    assert!(health.last_conflict_refresh().is_none());
    refresher.refresh_once().expect("refresh");
    assert_eq!(health.last_conflict_refresh(), Some(clock.now()));
}

#[test]
fn readiness_combines_store_and_worker_freshness() {
    let (store, clock, _pipeline) = seeded();
    let health = HealthState::new();
    let service = HealthService::new(
        Arc::clone(&store),
        Arc::clone(&health),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Duration::from_secs(5),
        Duration::from_secs(30),
    );
    assert!(service.live());

    // No worker has reported yet: not ready.
    let report = service.ready();
    assert!(!report.ready);
    assert!(report.store_reachable);
    assert!(!report.outbox_fresh);
    assert!(!report.conflicts_fresh);

    health.record_outbox_poll(clock.now());
    health.record_conflict_refresh(clock.now());
    assert!(service.ready().ready);

    // Outbox staleness past twice the poll interval flips readiness off.
    clock.advance_micros(11 * 1_000_000);
    let stale = service.ready();
    assert!(!stale.ready);
    assert!(!stale.outbox_fresh);
    assert!(stale.conflicts_fresh, "conflict budget (60 s) is not exhausted yet");

    // A dead store also flips readiness off.
    health.record_outbox_poll(clock.now());
    store.set_fail_readiness(true);
    assert!(!service.ready().ready);
    assert!(!service.ready().store_reachable);
}
