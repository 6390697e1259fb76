// crates/akashi-core/tests/buffer.rs
// ============================================================================
// Module: Event Buffer Tests
// Description: Verifies non-blocking offers, flush triggers, and drain.
// ============================================================================
//! ## Overview
//! Exercises the bounded event buffer: drop-oldest overflow, threshold and
//! timer flushes through the background task, retry without duplicate
//! inserts, and drain semantics (refuses new offers, empties or hits the
//! deadline).

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

use akashi_core::AgentEvent;
use akashi_core::AgentName;
use akashi_core::EventBuffer;
use akashi_core::EventBufferConfig;
use akashi_core::EventStore;
use akashi_core::InMemoryStore;
use akashi_core::NoopAuditSink;
use akashi_core::NoopMetrics;
use akashi_core::OrgId;
use akashi_core::RunId;
use akashi_core::Timestamp;
use serde_json::json;
use tokio::sync::watch;

fn event(run_id: RunId, sequence: u64) -> AgentEvent {
    AgentEvent {
        run_id,
        org_id: OrgId::new("org-1"),
        event_type: "step".to_string(),
        sequence_num: sequence,
        occurred_at: Timestamp::from_unix_micros(1_768_500_000_000_000),
        agent: AgentName::new("a1"),
        payload: json!({"sequence": sequence}),
    }
}

fn buffer_with(
    config: EventBufferConfig,
) -> (Arc<InMemoryStore>, Arc<EventBuffer>) {
    let store = Arc::new(InMemoryStore::new());
    let buffer = EventBuffer::new(
        config,
        Arc::clone(&store) as Arc<dyn EventStore>,
        Arc::new(NoopMetrics),
        Arc::new(NoopAuditSink),
    );
    (store, buffer)
}

#[tokio::test]
async fn drain_flushes_everything_in_arrival_order() {
    let (store, buffer) = buffer_with(EventBufferConfig::default());
    let run_id = RunId::generate();
    for sequence in 0 .. 25 {
        assert!(buffer.offer(event(run_id, sequence)));
    }
    let outcome = buffer.drain(Duration::from_secs(5)).await;
    assert_eq!(outcome.flushed, 25);
    assert_eq!(outcome.dropped, 0);
    assert!(!outcome.deadline_hit);

    let stored = store.events_for_run(run_id, 100).expect("events");
    assert_eq!(stored.len(), 25);
    let sequences: Vec<u64> = stored.iter().map(|e| e.sequence_num).collect();
    assert_eq!(sequences, (0 .. 25).collect::<Vec<_>>());
}

#[tokio::test]
async fn drain_refuses_new_offers() {
    let (_store, buffer) = buffer_with(EventBufferConfig::default());
    let run_id = RunId::generate();
    buffer.offer(event(run_id, 0));
    let outcome = buffer.drain(Duration::from_secs(5)).await;
    assert_eq!(outcome.flushed, 1);
    assert!(!buffer.offer(event(run_id, 1)), "offers after drain must be refused");
}

#[tokio::test]
async fn overflow_drops_the_oldest_event() {
    let config = EventBufferConfig {
        capacity: 10,
        flush_threshold: 100,
        ..EventBufferConfig::default()
    };
    let (store, buffer) = buffer_with(config);
    let run_id = RunId::generate();
    for sequence in 0 .. 15 {
        assert!(buffer.offer(event(run_id, sequence)), "offer never blocks or fails");
    }
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.dropped_total(), 5);

    buffer.drain(Duration::from_secs(5)).await;
    let stored = store.events_for_run(run_id, 100).expect("events");
    let sequences: Vec<u64> = stored.iter().map(|e| e.sequence_num).collect();
    assert_eq!(sequences, (5 .. 15).collect::<Vec<_>>(), "oldest five were dropped");
}

#[tokio::test]
async fn transient_failures_retry_without_duplicates() {
    let config = EventBufferConfig {
        retry_backoff: Duration::from_millis(1),
        ..EventBufferConfig::default()
    };
    let (store, buffer) = buffer_with(config);
    store.set_event_insert_failures(2);
    let run_id = RunId::generate();
    for sequence in 0 .. 5 {
        buffer.offer(event(run_id, sequence));
    }
    let outcome = buffer.drain(Duration::from_secs(5)).await;
    assert_eq!(outcome.flushed, 5, "batch lands after retries");

    let stored = store.events_for_run(run_id, 100).expect("events");
    assert_eq!(stored.len(), 5, "retries must not duplicate rows");
}

#[tokio::test]
async fn exhausted_retries_drop_the_batch_for_liveness() {
    let config = EventBufferConfig {
        max_flush_retries: 1,
        retry_backoff: Duration::from_millis(1),
        ..EventBufferConfig::default()
    };
    let (store, buffer) = buffer_with(config);
    store.set_event_insert_failures(10);
    let run_id = RunId::generate();
    for sequence in 0 .. 3 {
        buffer.offer(event(run_id, sequence));
    }
    let outcome = buffer.drain(Duration::from_secs(5)).await;
    assert_eq!(outcome.flushed, 0);
    assert!(buffer.is_empty(), "the batch is dropped, never wedged");
    assert_eq!(buffer.dropped_total(), 3);
    assert!(store.events_for_run(run_id, 100).expect("events").is_empty());
}

#[tokio::test(start_paused = true)]
async fn background_flusher_honors_the_timer() {
    let config = EventBufferConfig {
        flush_interval: Duration::from_millis(100),
        flush_threshold: 1_000,
        ..EventBufferConfig::default()
    };
    let (store, buffer) = buffer_with(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = buffer.spawn_flusher(shutdown_rx);

    let run_id = RunId::generate();
    for sequence in 0 .. 3 {
        buffer.offer(event(run_id, sequence));
    }
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        store.events_for_run(run_id, 100).expect("events").len(),
        3,
        "timer flush must land without reaching the threshold"
    );

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("flusher exits");
}

#[tokio::test]
async fn threshold_crossing_wakes_the_flusher() {
    let config = EventBufferConfig {
        flush_interval: Duration::from_secs(3600),
        flush_threshold: 4,
        ..EventBufferConfig::default()
    };
    let (store, buffer) = buffer_with(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = buffer.spawn_flusher(shutdown_rx);

    let run_id = RunId::generate();
    for sequence in 0 .. 4 {
        buffer.offer(event(run_id, sequence));
    }
    // The ticker is an hour out; only the threshold wake-up can flush.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.events_for_run(run_id, 100).expect("events").len() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("threshold flush within the timeout");

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("flusher exits");
}
