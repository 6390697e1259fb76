// crates/akashi-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Targeted tests for the SQLite decision plane gateway.
// Purpose: Validate the trace transaction, bi-temporal supersession, quota
//          enforcement, outbox claim semantics, idempotency lifecycle, and
//          schema versioning.
// ============================================================================

//! ## Overview
//! Unit-level tests for the `SQLite` gateway invariants:
//! - One atomic trace transaction (decision, children, outbox, usage,
//!   idempotency)
//! - At most one current revision per logical key
//! - Race-free quota enforcement and rollback on rejection
//! - Outbox claim ordering, lock windows, retries, and dead-letter sweeps
//! - Idempotency key lifecycle and TTL reclamation
//! - Schema version validation and concurrent writers

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;

use akashi_core::Agent;
use akashi_core::AgentId;
use akashi_core::AgentName;
use akashi_core::AgentRole;
use akashi_core::AgentRun;
use akashi_core::AgentStore;
use akashi_core::AgentEvent;
use akashi_core::Alternative;
use akashi_core::ConflictFilter;
use akashi_core::ConflictKind;
use akashi_core::ContentHashFields;
use akashi_core::Decision;
use akashi_core::DecisionId;
use akashi_core::DecisionStore;
use akashi_core::Evidence;
use akashi_core::EventStore;
use akashi_core::IdempotencyBegin;
use akashi_core::IdempotencyKey;
use akashi_core::IdempotencyState;
use akashi_core::IdempotencyStore;
use akashi_core::InMemoryStore;
use akashi_core::OrgId;
use akashi_core::Organization;
use akashi_core::OutboxOperation;
use akashi_core::OutboxStore;
use akashi_core::Plan;
use akashi_core::ProofStore;
use akashi_core::RunId;
use akashi_core::RunStatus;
use akashi_core::RunStore;
use akashi_core::StoreError;
use akashi_core::StoreHealth;
use akashi_core::Timestamp;
use akashi_core::TraceStore;
use akashi_core::TraceWrite;
use akashi_core::UsageStore;
use akashi_core::build_integrity_proof;
use akashi_core::compute_content_hash;
use akashi_core::hash_api_key;
use akashi_store_sqlite::SqliteStore;
use akashi_store_sqlite::SqliteStoreConfig;
use akashi_store_sqlite::SqliteStoreError;
use akashi_store_sqlite::SqliteStoreMode;
use akashi_store_sqlite::SqliteSyncMode;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

const START_MICROS: i64 = 1_768_500_000_000_000;
const MAX_ATTEMPTS: u32 = 10;

fn now() -> Timestamp {
    Timestamp::from_unix_micros(START_MICROS)
}

fn org() -> OrgId {
    OrgId::new("org-1")
}

fn file_config(dir: &TempDir) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: dir.path().join("akashi.db"),
        busy_timeout_ms: 5_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
    }
}

fn seed(store: &SqliteStore, decision_limit: u64) {
    store
        .put_org(&Organization {
            id: org(),
            plan: Plan::Pro,
            decision_limit,
            agent_limit: 0,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now(),
        })
        .expect("seed org");
    for name in ["a1", "a2", "a3", "a4"] {
        store
            .put_agent(&Agent {
                id: AgentId::generate(),
                name: AgentName::new(name),
                org_id: org(),
                role: AgentRole::Agent,
                api_key_hash: hash_api_key("test-key"),
                metadata: json!({}),
                created_at: now(),
            })
            .expect("seed agent");
    }
}

fn memory_store(decision_limit: u64) -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open store");
    seed(&store, decision_limit);
    store
}

/// Builds a fully-prepared trace write with a fresh implicit run.
fn trace_write(agent: &str, decision_type: &str, outcome: &str, at: Timestamp) -> TraceWrite {
    let decision_id = DecisionId::generate();
    let run = AgentRun {
        id: RunId::generate(),
        agent: AgentName::new(agent),
        org_id: org(),
        status: RunStatus::Running,
        parent_run_id: None,
        trace_id: None,
        started_at: at,
        completed_at: None,
    };
    let content_hash = compute_content_hash(&ContentHashFields {
        id: decision_id,
        decision_type,
        outcome,
        confidence: 0.8,
        reasoning: Some("tested"),
        valid_from: at,
    });
    TraceWrite {
        org_id: org(),
        agent: AgentName::new(agent),
        decision: Decision {
            id: decision_id,
            run_id: run.id,
            agent: AgentName::new(agent),
            org_id: org(),
            decision_type: decision_type.to_string(),
            outcome: outcome.to_string(),
            confidence: 0.8,
            reasoning: Some("tested".to_string()),
            metadata: json!({"source": "test"}),
            embedding: Some(vec![0.5, 0.25]),
            quality_score: 0.7,
            precedent_ref: None,
            valid_from: at,
            valid_to: None,
            transaction_time: at,
            content_hash,
        },
        create_run: Some(run),
        alternatives: Vec::new(),
        evidence: Vec::new(),
        idempotency: None,
        quota_limit: 0,
        period: at.period(),
        now: at,
    }
}

#[test]
fn trace_transaction_persists_every_row() {
    let store = memory_store(0);
    let mut write = trace_write("a1", "db", "postgres", now());
    write.alternatives = vec![Alternative {
        id: Uuid::new_v4(),
        decision_id: write.decision.id,
        label: "mysql".to_string(),
        score: Some(0.4),
        selected: false,
        rejection_reason: Some("weaker json support".to_string()),
        metadata: json!({}),
    }];
    write.evidence = vec![Evidence {
        id: Uuid::new_v4(),
        decision_id: write.decision.id,
        source_type: "benchmark".to_string(),
        source_uri: Some("bench://tpcc".to_string()),
        content: "p99 held under 5ms".to_string(),
        relevance_score: Some(0.9),
        metadata: json!({}),
    }];
    write.idempotency =
        Some((IdempotencyKey::new("K"), json!({"decision_id": write.decision.id})));
    write.quota_limit = 10;

    let outcome = store.create_trace(&write).expect("create trace");
    assert_eq!(outcome.decision_id, write.decision.id);
    assert!(outcome.superseded.is_none());

    let current = store
        .current_decision(&org(), &AgentName::new("a1"), "db")
        .expect("query")
        .expect("current");
    assert_eq!(current.id, write.decision.id);
    assert_eq!(current.outcome, "postgres");
    assert_eq!(current.embedding, Some(vec![0.5, 0.25]));
    assert_eq!(current.metadata, json!({"source": "test"}));
    assert!(current.content_hash.starts_with("v2:"));

    assert_eq!(store.alternatives_for(write.decision.id).expect("alts").len(), 1);
    assert_eq!(store.evidence_for(write.decision.id).expect("evidence").len(), 1);
    assert_eq!(store.outbox_depth(MAX_ATTEMPTS).expect("depth"), 1);
    assert_eq!(store.usage(&org(), &now().period()).expect("usage"), 1);

    let record = store
        .get_idempotent(&org(), &IdempotencyKey::new("K"))
        .expect("get")
        .expect("record");
    assert_eq!(record.state, IdempotencyState::Completed);
    assert!(record.response_snapshot.is_some());
}

#[test]
fn second_revision_supersedes_the_first() {
    let store = memory_store(0);
    let first = trace_write("a1", "db", "postgres", now());
    store.create_trace(&first).expect("first trace");

    let later = now().plus_seconds(60);
    let second = trace_write("a1", "db", "mysql", later);
    let outcome = store.create_trace(&second).expect("second trace");
    assert_eq!(outcome.superseded, Some(first.decision.id));

    let old = store.get_decision(&org(), first.decision.id).expect("get").expect("row");
    assert_eq!(old.valid_to, Some(later), "prior revision closes at the successor start");

    let current = store
        .current_decision(&org(), &AgentName::new("a1"), "db")
        .expect("query")
        .expect("current");
    assert_eq!(current.id, second.decision.id, "at most one current revision per key");
}

#[test]
fn quota_rejection_rolls_back_the_whole_transaction() {
    let store = memory_store(0);
    let mut first = trace_write("a1", "t1", "x", now());
    first.quota_limit = 1;
    store.create_trace(&first).expect("first trace");

    let mut second = trace_write("a1", "t2", "y", now().plus_seconds(1));
    second.quota_limit = 1;
    second.idempotency = Some((IdempotencyKey::new("K2"), json!({})));
    let denied = store.create_trace(&second);
    assert!(matches!(
        denied,
        Err(StoreError::QuotaExceeded { limit: 1, count: 1 })
    ));

    // Nothing from the rejected transaction may remain.
    assert_eq!(store.usage(&org(), &now().period()).expect("usage"), 1);
    assert_eq!(store.outbox_depth(MAX_ATTEMPTS).expect("depth"), 1);
    assert!(store.get_decision(&org(), second.decision.id).expect("get").is_none());
    assert!(
        store.get_idempotent(&org(), &IdempotencyKey::new("K2")).expect("get").is_none(),
        "idempotency completion must roll back with the transaction"
    );
}

#[test]
fn trace_against_a_missing_run_is_rejected() {
    let store = memory_store(0);
    let mut write = trace_write("a1", "db", "postgres", now());
    write.create_run = None;
    let denied = store.create_trace(&write);
    assert!(matches!(denied, Err(StoreError::NotFound(_))));
}

#[test]
fn idempotency_lifecycle_started_inflight_replayed() {
    let store = memory_store(0);
    let key = IdempotencyKey::new("K");

    let begin = store.begin_idempotent(&org(), &key, now()).expect("begin");
    assert_eq!(begin, IdempotencyBegin::Started);

    let contested = store.begin_idempotent(&org(), &key, now().plus_seconds(1)).expect("begin");
    assert_eq!(contested, IdempotencyBegin::InFlight, "live keys fail fast");

    let mut write = trace_write("a1", "db", "postgres", now().plus_seconds(2));
    write.idempotency = Some((key.clone(), json!({"cached": true})));
    store.create_trace(&write).expect("complete the key");

    let replayed =
        store.begin_idempotent(&org(), &key, now().plus_seconds(3)).expect("begin");
    assert_eq!(replayed, IdempotencyBegin::Replayed(json!({"cached": true})));
}

#[test]
fn expired_in_progress_keys_are_taken_over() {
    let store = memory_store(0);
    let key = IdempotencyKey::new("K");
    store.begin_idempotent(&org(), &key, now()).expect("begin");

    // Six minutes later the in-progress TTL (five minutes) has lapsed.
    let later = now().plus_seconds(6 * 60);
    let retried = store.begin_idempotent(&org(), &key, later).expect("begin");
    assert_eq!(retried, IdempotencyBegin::Started, "expired keys are reclaimed in place");
}

#[test]
fn abandoned_and_expired_keys_are_swept() {
    let store = memory_store(0);
    let key = IdempotencyKey::new("K");
    store.begin_idempotent(&org(), &key, now()).expect("begin");
    store.abandon_idempotent(&org(), &key, now()).expect("abandon");

    let record = store.get_idempotent(&org(), &key).expect("get").expect("record");
    assert_eq!(record.state, IdempotencyState::Abandoned);

    assert_eq!(store.sweep_idempotency_keys(now()).expect("early sweep"), 0);
    let after_ttl = now().plus_seconds(25 * 60 * 60);
    assert_eq!(store.sweep_idempotency_keys(after_ttl).expect("sweep"), 1);
    assert!(store.get_idempotent(&org(), &key).expect("get").is_none());
}

#[test]
fn outbox_claims_oldest_first_and_respects_locks() {
    let store = memory_store(0);
    let first = DecisionId::generate();
    let second = DecisionId::generate();
    let third = DecisionId::generate();
    store
        .enqueue_outbox(first, &org(), OutboxOperation::Upsert, now())
        .expect("enqueue");
    store
        .enqueue_outbox(second, &org(), OutboxOperation::Upsert, now().plus_seconds(1))
        .expect("enqueue");
    store
        .enqueue_outbox(third, &org(), OutboxOperation::Delete, now().plus_seconds(2))
        .expect("enqueue");

    let claim_time = now().plus_seconds(10);
    let lease = claim_time.plus_seconds(60);
    let batch = store
        .claim_outbox_batch(2, claim_time, lease, MAX_ATTEMPTS)
        .expect("claim");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].decision_id, first, "created_at ascending");
    assert_eq!(batch[1].decision_id, second);
    assert!(batch.iter().all(|entry| entry.locked_until == Some(lease)));

    // Locked entries are invisible to a second claimant.
    let remainder = store
        .claim_outbox_batch(10, claim_time, lease, MAX_ATTEMPTS)
        .expect("claim");
    assert_eq!(remainder.len(), 1);
    assert_eq!(remainder[0].decision_id, third);

    // After the lease expires the first batch is claimable again.
    let after_lease = claim_time.plus_seconds(61);
    let reclaimed = store
        .claim_outbox_batch(10, after_lease, after_lease.plus_seconds(60), MAX_ATTEMPTS)
        .expect("claim");
    assert_eq!(reclaimed.len(), 3, "lock expiry reclaims crashed claims");
}

#[test]
fn outbox_failures_accumulate_and_dead_letter() {
    let store = memory_store(0);
    let decision = DecisionId::generate();
    let entry_id = store
        .enqueue_outbox(decision, &org(), OutboxOperation::Upsert, now())
        .expect("enqueue");

    let retry_at = now().plus_seconds(8);
    store.fail_outbox(&[(entry_id, retry_at)], "index returned 503").expect("fail");

    // Before the retry instant the entry stays invisible.
    let early = store
        .claim_outbox_batch(10, now().plus_seconds(4), now().plus_seconds(64), MAX_ATTEMPTS)
        .expect("claim");
    assert!(early.is_empty());

    let late = store
        .claim_outbox_batch(10, now().plus_seconds(9), now().plus_seconds(69), MAX_ATTEMPTS)
        .expect("claim");
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].attempts, 1);
    assert_eq!(late[0].last_error.as_deref(), Some("index returned 503"));

    // Nine more failures dead-letter the entry.
    for round in 2 ..= MAX_ATTEMPTS {
        store
            .fail_outbox(&[(entry_id, now().plus_seconds(i64::from(round)))], "still down")
            .expect("fail");
    }
    assert_eq!(store.dead_letter_count(MAX_ATTEMPTS).expect("count"), 1);
    assert_eq!(store.outbox_depth(MAX_ATTEMPTS).expect("depth"), 0);
    let none = store
        .claim_outbox_batch(10, now().plus_seconds(3_600), now().plus_seconds(3_660), MAX_ATTEMPTS)
        .expect("claim");
    assert!(none.is_empty(), "dead letters are never claimed");

    // The retention sweep removes only old-enough dead letters.
    assert_eq!(
        store.sweep_dead_letters(now(), MAX_ATTEMPTS).expect("sweep"),
        0,
        "entry created now is inside retention"
    );
    let cutoff = now().plus_seconds(1);
    assert_eq!(store.sweep_dead_letters(cutoff, MAX_ATTEMPTS).expect("sweep"), 1);
}

#[test]
fn acked_entries_are_deleted() {
    let store = memory_store(0);
    let entry_id = store
        .enqueue_outbox(DecisionId::generate(), &org(), OutboxOperation::Upsert, now())
        .expect("enqueue");
    store.ack_outbox(&[entry_id]).expect("ack");
    assert_eq!(store.outbox_depth(MAX_ATTEMPTS).expect("depth"), 0);
}

#[test]
fn event_batches_dedupe_on_run_and_sequence() {
    let store = memory_store(0);
    let run_id = RunId::generate();
    let events: Vec<AgentEvent> = (0 .. 3)
        .map(|sequence| AgentEvent {
            run_id,
            org_id: org(),
            event_type: "step".to_string(),
            sequence_num: sequence,
            occurred_at: now(),
            agent: AgentName::new("a1"),
            payload: json!({"sequence": sequence}),
        })
        .collect();

    assert_eq!(store.insert_events(&events).expect("insert"), 3);
    assert_eq!(store.insert_events(&events).expect("reinsert"), 0, "retries never duplicate");

    let stored = store.events_for_run(run_id, 10).expect("events");
    assert_eq!(stored.len(), 3);
    let sequences: Vec<u64> = stored.iter().map(|event| event.sequence_num).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn as_of_queries_follow_validity_windows() {
    let store = memory_store(0);
    let first = trace_write("a1", "db", "postgres", now());
    store.create_trace(&first).expect("first");
    let later = now().plus_seconds(100);
    let second = trace_write("a1", "db", "mysql", later);
    store.create_trace(&second).expect("second");

    let mid = store
        .decisions_as_of(&org(), now().plus_seconds(50), Some("db"), 10)
        .expect("as of");
    assert_eq!(mid.len(), 1);
    assert_eq!(mid[0].id, first.decision.id, "old revision was valid mid-window");

    let after = store
        .decisions_as_of(&org(), now().plus_seconds(200), Some("db"), 10)
        .expect("as of");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, second.decision.id);

    let before = store
        .decisions_as_of(&org(), now().plus_seconds(-10), Some("db"), 10)
        .expect("as of");
    assert!(before.is_empty(), "nothing was valid before the first revision");
}

#[test]
fn stats_reflect_current_decisions_and_evidence_coverage() {
    let store = memory_store(0);
    let mut with_evidence = trace_write("a1", "db", "postgres", now());
    with_evidence.evidence = vec![Evidence {
        id: Uuid::new_v4(),
        decision_id: with_evidence.decision.id,
        source_type: "doc".to_string(),
        source_uri: None,
        content: "cited".to_string(),
        relevance_score: None,
        metadata: json!({}),
    }];
    store.create_trace(&with_evidence).expect("first");
    store
        .create_trace(&trace_write("a2", "cache", "redis", now().plus_seconds(1)))
        .expect("second");

    let quality = store.decision_quality_stats(&org()).expect("quality");
    assert_eq!(quality.total_decisions, 2);
    assert!((quality.average_confidence - 0.8).abs() < 1e-9);

    let coverage = store.evidence_coverage_stats(&org()).expect("coverage");
    assert_eq!(coverage.total_decisions, 2);
    assert_eq!(coverage.with_evidence, 1);
    assert!((coverage.coverage - 0.5).abs() < 1e-9);
}

#[test]
fn multi_evidence_decisions_count_once_in_coverage() {
    let sqlite = memory_store(0);
    let memory = InMemoryStore::new();

    // One current decision with three evidence rows, one with none; the
    // identical writes go to both backends.
    let mut cited = trace_write("a1", "db", "postgres", now());
    cited.evidence = (0 .. 3)
        .map(|index| Evidence {
            id: Uuid::new_v4(),
            decision_id: cited.decision.id,
            source_type: "doc".to_string(),
            source_uri: None,
            content: format!("citation {index}"),
            relevance_score: None,
            metadata: json!({}),
        })
        .collect();
    let bare = trace_write("a2", "cache", "redis", now().plus_seconds(1));
    for write in [&cited, &bare] {
        sqlite.create_trace(write).expect("sqlite trace");
        memory.create_trace(write).expect("memory trace");
    }

    let from_sqlite = sqlite.evidence_coverage_stats(&org()).expect("sqlite coverage");
    let from_memory = memory.evidence_coverage_stats(&org()).expect("memory coverage");

    // Evidence fan-out must not inflate the decision count.
    assert_eq!(from_sqlite.total_decisions, 2, "distinct current decisions");
    assert_eq!(from_sqlite.with_evidence, 1);
    assert!((from_sqlite.coverage - 0.5).abs() < 1e-9);

    assert_eq!(from_sqlite.total_decisions, from_memory.total_decisions);
    assert_eq!(from_sqlite.with_evidence, from_memory.with_evidence);
    assert!((from_sqlite.coverage - from_memory.coverage).abs() < 1e-9);
}

#[test]
fn conflicts_derive_from_the_refreshed_projection() {
    let store = memory_store(0);
    store.create_trace(&trace_write("a1", "db", "postgres", now())).expect("a1");
    store
        .create_trace(&trace_write("a2", "db", "mysql", now().plus_seconds(1)))
        .expect("a2");
    // a1 flips its own decision to create a self-contradiction.
    store
        .create_trace(&trace_write("a1", "db", "sqlite", now().plus_seconds(2)))
        .expect("a1 again");

    let refreshed_at = now().plus_seconds(3);
    store.refresh_conflicts(refreshed_at).expect("refresh");

    let all = store
        .list_conflicts(&org(), &ConflictFilter::default(), 10, 0)
        .expect("list");
    assert_eq!(all.total, 2, "one cross-agent pair and one self-contradiction");
    assert!(all.items.iter().all(|conflict| conflict.detected_at == refreshed_at));

    let cross = store
        .list_conflicts(
            &org(),
            &ConflictFilter {
                kind: Some(ConflictKind::CrossAgent),
                ..ConflictFilter::default()
            },
            10,
            0,
        )
        .expect("cross");
    assert_eq!(cross.total, 1);
    assert_ne!(cross.items[0].agent_a, cross.items[0].agent_b);

    let self_kind = store
        .list_conflicts(
            &org(),
            &ConflictFilter {
                kind: Some(ConflictKind::SelfContradiction),
                ..ConflictFilter::default()
            },
            10,
            0,
        )
        .expect("self");
    assert_eq!(self_kind.total, 1);
    assert_eq!(self_kind.items[0].outcome_a, "sqlite");
    assert_eq!(self_kind.items[0].outcome_b, "postgres");

    assert_eq!(store.count_conflicts(&org(), &ConflictFilter::default()).expect("count"), 2);
}

#[test]
fn proof_rows_round_trip_and_cover_the_window() {
    let store = memory_store(0);
    let first = trace_write("a1", "db", "postgres", now());
    store.create_trace(&first).expect("first");
    let second = trace_write("a2", "cache", "redis", now().plus_seconds(10));
    store.create_trace(&second).expect("second");

    let hashes = store
        .content_hashes_in_window(now(), now().plus_seconds(5))
        .expect("window");
    assert_eq!(hashes, vec![first.decision.content_hash.clone()]);

    let mut leaves = store
        .content_hashes_in_window(now(), now().plus_seconds(60))
        .expect("window");
    assert_eq!(leaves.len(), 2);
    leaves.sort_unstable();

    let proof = build_integrity_proof(
        akashi_core::BatchId::generate(),
        leaves,
        now(),
        now().plus_seconds(60),
        now().plus_seconds(61),
    );
    store.put_proof(&proof).expect("put proof");
    let latest = store.latest_proof().expect("latest").expect("stored");
    assert_eq!(latest, proof);
}

#[test]
fn run_and_agent_records_round_trip() {
    let store = memory_store(0);
    let run = AgentRun {
        id: RunId::generate(),
        agent: AgentName::new("a1"),
        org_id: org(),
        status: RunStatus::Running,
        parent_run_id: None,
        trace_id: Some("trace-abc".to_string()),
        started_at: now(),
        completed_at: None,
    };
    store.insert_run(&run).expect("insert run");
    let loaded = store.get_run(&org(), run.id).expect("get").expect("run");
    assert_eq!(loaded, run);

    store
        .complete_run(&org(), run.id, RunStatus::Failed, now().plus_seconds(5))
        .expect("complete");
    let finished = store.get_run(&org(), run.id).expect("get").expect("run");
    assert_eq!(finished.status, RunStatus::Failed);
    assert_eq!(finished.completed_at, Some(now().plus_seconds(5)));

    let missing = store.complete_run(&org(), RunId::generate(), RunStatus::Completed, now());
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    let agent = store
        .get_agent(&org(), &AgentName::new("a1"))
        .expect("get agent")
        .expect("agent");
    assert_eq!(agent.role, AgentRole::Agent);
    assert_eq!(store.count_agents(&org()).expect("count"), 4);

    let organization = store.get_org(&org()).expect("get org").expect("org");
    assert_eq!(organization.plan, Plan::Pro);
}

#[test]
fn readiness_probe_answers() {
    let store = memory_store(0);
    store.readiness().expect("ready");
}

#[test]
fn concurrent_traces_serialize_through_the_writer() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(SqliteStore::new(&file_config(&dir)).expect("open store"));
    seed(&store, 0);

    let mut handles = Vec::new();
    for (index, agent) in ["a1", "a2", "a3", "a4"].into_iter().enumerate() {
        let store = Arc::clone(&store);
        let at = now().plus_seconds(i64::try_from(index).unwrap_or(0));
        handles.push(thread::spawn(move || {
            store.create_trace(&trace_write(agent, "db", "postgres", at))
        }));
    }
    for handle in handles {
        handle.join().expect("join").expect("trace succeeds");
    }
    assert_eq!(store.usage(&org(), &now().period()).expect("usage"), 4);
    assert_eq!(store.outbox_depth(MAX_ATTEMPTS).expect("depth"), 4);
}

#[test]
fn newer_schema_versions_fail_closed() {
    let dir = TempDir::new().expect("tempdir");
    let config = file_config(&dir);
    drop(SqliteStore::new(&config).expect("create store"));

    let connection = rusqlite::Connection::open(&config.path).expect("raw open");
    connection
        .execute("UPDATE akashi_meta SET value = '99' WHERE key = 'schema_version'", [])
        .expect("bump version");
    drop(connection);

    let reopened = SqliteStore::new(&config);
    assert!(matches!(reopened, Err(SqliteStoreError::VersionMismatch(_))));
}
