// crates/akashi-core/src/runtime/outbox.rs
// ============================================================================
// Module: Akashi Search Outbox Worker
// Description: At-least-once delivery of decision changes to the vector
//              index.
// Purpose: Poll, claim, deliver, back off, and dead-letter outbox entries.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! The worker polls the outbox on a ticker and opportunistically on the
//! post-commit wake-up from the trace pipeline. Each poll claims a batch and
//! locks it *before* any network I/O: the lock window (60 s) exceeds the
//! index call timeout (30 s), so a second worker can never pick up entries
//! whose lock expired mid-call. Failed entries back off exponentially,
//! capped at five minutes; entries that exhaust their attempts are
//! dead-lettered, surfaced with a WARN audit record, and swept after the
//! retention window. Index failures never propagate to trace callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::outbox::OutboxEntry;
use crate::core::outbox::OutboxOperation;
use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::index::IndexPoint;
use crate::interfaces::index::VectorIndex;
use crate::interfaces::stores::DecisionStore;
use crate::interfaces::stores::IdempotencyStore;
use crate::interfaces::stores::OutboxStore;
use crate::interfaces::stores::StoreError;
use crate::interfaces::telemetry::AuditSink;
use crate::interfaces::telemetry::DeadLetterAuditEvent;
use crate::interfaces::telemetry::MetricsSink;
use crate::interfaces::telemetry::PlaneCounter;
use crate::interfaces::telemetry::PlaneGauge;
use crate::interfaces::telemetry::PlaneOp;
use crate::runtime::health::HealthState;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the outbox worker.
///
/// # Invariants
/// - `lock_seconds` must exceed the index client's per-batch timeout.
/// - `backoff_cap_seconds` caps the exponential retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxConfig {
    /// Poll ticker period; the correctness fallback for wake-ups.
    pub poll_interval: Duration,
    /// Maximum entries claimed per poll.
    pub batch_size: usize,
    /// Attempts before an entry is dead-lettered.
    pub max_attempts: u32,
    /// Claim lease duration in seconds.
    pub lock_seconds: i64,
    /// Exponential backoff cap in seconds.
    pub backoff_cap_seconds: i64,
    /// Dead-letter sweep period.
    pub sweep_interval: Duration,
    /// Dead-letter retention in seconds before the sweep removes entries.
    pub dead_letter_retention_seconds: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_attempts: 10,
            lock_seconds: 60,
            backoff_cap_seconds: 300,
            sweep_interval: Duration::from_secs(60 * 60),
            dead_letter_retention_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Returns the retry delay in seconds for a given attempt count.
///
/// The schedule is `min(2^attempts, cap)`; `attempts` is the post-increment
/// count, so the third failure waits eight seconds.
#[must_use]
pub fn backoff_seconds(attempts: u32, cap_seconds: i64) -> i64 {
    let exp = 2_i64.checked_pow(attempts.min(62)).unwrap_or(i64::MAX);
    exp.min(cap_seconds)
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Summary of one processed batch, used by tests and drain reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Entries claimed this poll.
    pub claimed: u64,
    /// Entries acknowledged after successful delivery.
    pub delivered: u64,
    /// Entries rescheduled with backoff.
    pub retried: u64,
    /// Entries that crossed into dead-letter state this poll.
    pub dead_lettered: u64,
}

/// Search outbox worker delivering decision changes to the vector index.
pub struct OutboxWorker<S, I> {
    /// Store providing claim/ack/fail operations and decision reads.
    store: Arc<S>,
    /// External vector index client.
    index: Arc<I>,
    /// Clock seam.
    clock: Arc<dyn Clock>,
    /// Post-commit wake-up shared with the trace pipeline.
    wake: Arc<Notify>,
    /// Freshness registry for the readiness surface.
    health: Arc<HealthState>,
    /// Audit sink for dead-letter transitions.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink for gauges and counters.
    metrics: Arc<dyn MetricsSink>,
    /// Worker configuration.
    config: OutboxConfig,
}

impl<S, I> OutboxWorker<S, I>
where
    S: OutboxStore + DecisionStore + IdempotencyStore + Send + Sync + 'static,
    I: VectorIndex + 'static,
{
    /// Creates a new worker over the provided seams.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        index: Arc<I>,
        clock: Arc<dyn Clock>,
        wake: Arc<Notify>,
        health: Arc<HealthState>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            store,
            index,
            clock,
            wake,
            health,
            audit,
            metrics,
            config,
        }
    }

    /// Claims and processes one batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for claim/ack/fail failures; index
    /// failures are absorbed into retry scheduling.
    pub fn poll_once(&self) -> Result<BatchReport, StoreError> {
        let started = Instant::now();
        let now = self.clock.now();
        self.health.record_outbox_poll(now);
        let locked_until = now.plus_seconds(self.config.lock_seconds);
        let batch = self.store.claim_outbox_batch(
            self.config.batch_size,
            now,
            locked_until,
            self.config.max_attempts,
        )?;
        let mut report = BatchReport {
            claimed: u64::try_from(batch.len()).unwrap_or(u64::MAX),
            ..BatchReport::default()
        };
        if !batch.is_empty() {
            let (upserts, deletes): (Vec<_>, Vec<_>) =
                batch.into_iter().partition(|entry| entry.operation == OutboxOperation::Upsert);
            self.deliver_upserts(upserts, now, &mut report)?;
            self.deliver_deletes(deletes, now, &mut report)?;
        }
        self.publish_gauges()?;
        self.metrics.record_latency(PlaneOp::OutboxBatch, started.elapsed());
        Ok(report)
    }

    /// Delivers upsert entries, acknowledging entries whose decisions no
    /// longer need syncing.
    fn deliver_upserts(
        &self,
        entries: Vec<OutboxEntry>,
        now: Timestamp,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let ids: Vec<_> = entries.iter().map(|entry| entry.decision_id).collect();
        let decisions = self.store.current_decisions_with_embeddings(&ids)?;
        let points: Vec<IndexPoint> =
            decisions.iter().filter_map(IndexPoint::from_decision).collect();
        // Entries whose decision was superseded, deleted, or stored without
        // an embedding have nothing to sync; acknowledge them outright.
        let indexed: std::collections::BTreeSet<_> =
            points.iter().map(|point| point.id).collect();
        let (live, stale): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| indexed.contains(&entry.decision_id));
        if !stale.is_empty() {
            let stale_ids: Vec<_> = stale.iter().map(|entry| entry.id).collect();
            self.store.ack_outbox(&stale_ids)?;
            report.delivered += u64::try_from(stale_ids.len()).unwrap_or(u64::MAX);
        }
        if live.is_empty() {
            return Ok(());
        }
        match self.index.upsert(&points) {
            Ok(()) => self.acknowledge(&live, report),
            Err(error) => self.reschedule(&live, now, &error.to_string(), report),
        }
    }

    /// Delivers delete entries.
    fn deliver_deletes(
        &self,
        entries: Vec<OutboxEntry>,
        now: Timestamp,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let ids: Vec<_> = entries.iter().map(|entry| entry.decision_id).collect();
        match self.index.delete_by_ids(&ids) {
            Ok(()) => self.acknowledge(&entries, report),
            Err(error) => self.reschedule(&entries, now, &error.to_string(), report),
        }
    }

    /// Acknowledges delivered entries.
    fn acknowledge(
        &self,
        entries: &[OutboxEntry],
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        let ids: Vec<_> = entries.iter().map(|entry| entry.id).collect();
        self.store.ack_outbox(&ids)?;
        let delivered = u64::try_from(ids.len()).unwrap_or(u64::MAX);
        report.delivered += delivered;
        self.metrics.record_counter(PlaneCounter::OutboxDelivered, delivered);
        Ok(())
    }

    /// Reschedules failed entries with exponential backoff and records
    /// dead-letter transitions.
    fn reschedule(
        &self,
        entries: &[OutboxEntry],
        now: Timestamp,
        error: &str,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        let mut rescheduled = Vec::with_capacity(entries.len());
        for entry in entries {
            let attempts = entry.attempts.saturating_add(1);
            let retry_at = now
                .plus_seconds(backoff_seconds(attempts, self.config.backoff_cap_seconds));
            rescheduled.push((entry.id, retry_at));
            if attempts >= self.config.max_attempts {
                report.dead_lettered += 1;
                self.metrics.record_counter(PlaneCounter::OutboxDeadLettered, 1);
                self.audit.record_dead_letter(&DeadLetterAuditEvent::new(
                    entry.id,
                    entry.decision_id,
                    attempts,
                    error.to_string(),
                ));
            } else {
                report.retried += 1;
            }
        }
        self.store.fail_outbox(&rescheduled, error)
    }

    /// Publishes outbox depth and dead-letter gauges.
    fn publish_gauges(&self) -> Result<(), StoreError> {
        let depth = self.store.outbox_depth(self.config.max_attempts)?;
        let dead = self.store.dead_letter_count(self.config.max_attempts)?;
        self.metrics.record_gauge(PlaneGauge::OutboxDepth, depth);
        self.metrics.record_gauge(PlaneGauge::DeadLetterCount, dead);
        Ok(())
    }

    /// Removes dead-lettered entries older than the retention window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn sweep_dead_letters(&self) -> Result<u64, StoreError> {
        let cutoff =
            self.clock.now().plus_seconds(-self.config.dead_letter_retention_seconds);
        self.store.sweep_dead_letters(cutoff, self.config.max_attempts)
    }

    /// Reclaims idempotency keys past their TTL.
    ///
    /// Runs on the same maintenance tick as the dead-letter sweep.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    pub fn sweep_idempotency_keys(&self) -> Result<u64, StoreError> {
        self.store.sweep_idempotency_keys(self.clock.now())
    }

    /// Processes one final batch under the caller's deadline.
    pub async fn drain(&self, deadline: Duration) -> BatchReport {
        let worker = self;
        tokio::time::timeout(deadline, async move {
            worker.poll_once().unwrap_or_default()
        })
        .await
        .unwrap_or_default()
    }

    /// Spawns the worker loop.
    ///
    /// The loop wakes on the poll ticker, on pipeline notifications, and on
    /// the sweep ticker; it exits when the shutdown signal flips. Store
    /// errors inside the loop are absorbed; the next tick retries.
    #[must_use]
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut poll_ticker = tokio::time::interval(self.config.poll_interval);
            poll_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut sweep_ticker = tokio::time::interval(self.config.sweep_interval);
            sweep_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = poll_ticker.tick() => {
                        let _ = self.poll_once();
                    }
                    () = self.wake.notified() => {
                        let _ = self.poll_once();
                    }
                    _ = sweep_ticker.tick() => {
                        let _ = self.sweep_dead_letters();
                        let _ = self.sweep_idempotency_keys();
                    }
                    changed = shutdown.changed() => {
                        let stop = changed.is_err() || *shutdown.borrow();
                        if stop {
                            break;
                        }
                    }
                }
            }
        })
    }
}
