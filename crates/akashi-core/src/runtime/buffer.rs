// crates/akashi-core/src/runtime/buffer.rs
// ============================================================================
// Module: Akashi Event Buffer
// Description: Bounded in-memory fan-in for high-volume agent events.
// Purpose: Keep the trace hot path non-blocking while batching event writes.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! The event buffer absorbs agent events without ever blocking the caller:
//! an offer either enqueues or, when the buffer is full, drops the oldest
//! event and counts the loss. A flusher task writes batches on a size
//! threshold or a timer, retrying transient store failures with exponential
//! backoff before dropping the batch to preserve liveness. Under sustained
//! overload events are lossy; traces never are.
//!
//! Sequence numbers are assigned by callers, never here; the buffer only
//! preserves arrival order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::run::AgentEvent;
use crate::interfaces::stores::EventStore;
use crate::interfaces::telemetry::AuditSink;
use crate::interfaces::telemetry::DrainAuditEvent;
use crate::interfaces::telemetry::MetricsSink;
use crate::interfaces::telemetry::PlaneCounter;
use crate::interfaces::telemetry::PlaneGauge;
use crate::interfaces::telemetry::PlaneOp;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the event buffer.
///
/// # Invariants
/// - `capacity` bounds resident events; overflow drops the oldest entry.
/// - `flush_interval` is the liveness fallback when the threshold is never
///   reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBufferConfig {
    /// Maximum buffered events before drop-oldest engages.
    pub capacity: usize,
    /// Queue length that triggers an immediate flush.
    pub flush_threshold: usize,
    /// Timer-driven flush period.
    pub flush_interval: Duration,
    /// Maximum events written per batch statement.
    pub max_batch_size: usize,
    /// Transient-failure retries before a batch is dropped.
    pub max_flush_retries: u32,
    /// Base backoff between flush retries; doubles per attempt.
    pub retry_backoff: Duration,
}

impl Default for EventBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            flush_threshold: 100,
            flush_interval: Duration::from_millis(100),
            max_batch_size: 500,
            max_flush_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Outcome of a shutdown drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainOutcome {
    /// Events flushed to the store during the drain.
    pub flushed: u64,
    /// Events abandoned because the deadline passed.
    pub dropped: u64,
    /// Whether the deadline passed before the queue emptied.
    pub deadline_hit: bool,
}

// ============================================================================
// SECTION: Buffer
// ============================================================================

/// Mutable queue state behind the buffer mutex.
struct BufferState {
    /// Buffered events in arrival order.
    queue: VecDeque<AgentEvent>,
    /// Once closed, offers are refused; set by `drain`.
    closed: bool,
}

/// Bounded, non-blocking event buffer with a background flusher.
pub struct EventBuffer {
    /// Queue state; critical sections are short and never span a flush.
    state: Mutex<BufferState>,
    /// Wakes the flusher when the threshold is crossed.
    notify: Notify,
    /// Store receiving flushed batches.
    store: Arc<dyn EventStore>,
    /// Metrics sink.
    metrics: Arc<dyn MetricsSink>,
    /// Audit sink for drain outcomes.
    audit: Arc<dyn AuditSink>,
    /// Buffer configuration.
    config: EventBufferConfig,
    /// Total events dropped on overflow since construction.
    dropped_total: AtomicU64,
}

impl EventBuffer {
    /// Creates a new event buffer over the provided seams.
    #[must_use]
    pub fn new(
        config: EventBufferConfig,
        store: Arc<dyn EventStore>,
        metrics: Arc<dyn MetricsSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(config.capacity.min(1_024)),
                closed: false,
            }),
            notify: Notify::new(),
            store,
            metrics,
            audit,
            config,
            dropped_total: AtomicU64::new(0),
        })
    }

    /// Offers an event without blocking.
    ///
    /// Returns `false` when the buffer is draining and refuses new events.
    /// On overflow the oldest buffered event is dropped and counted.
    pub fn offer(&self, event: AgentEvent) -> bool {
        let should_wake = {
            let mut state =
                self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if state.closed {
                return false;
            }
            state.queue.push_back(event);
            if state.queue.len() > self.config.capacity {
                state.queue.pop_front();
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_counter(PlaneCounter::BufferDropped, 1);
            }
            let depth = u64::try_from(state.queue.len()).unwrap_or(u64::MAX);
            self.metrics.record_gauge(PlaneGauge::BufferDepth, depth);
            state.queue.len() >= self.config.flush_threshold
        };
        if should_wake {
            self.notify.notify_one();
        }
        true
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).queue.len()
    }

    /// Returns whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of events dropped on overflow.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Takes the next batch off the queue.
    fn take_batch(&self) -> Vec<AgentEvent> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = state.queue.len().min(self.config.max_batch_size);
        state.queue.drain(.. count).collect()
    }

    /// Flushes one batch, retrying transient failures with backoff.
    ///
    /// Returns the number of events flushed. A batch that keeps failing is
    /// dropped so the buffer never wedges the process; the retried insert is
    /// safe because the store skips duplicate `(run, sequence)` pairs.
    async fn flush_once(&self) -> u64 {
        let batch = self.take_batch();
        if batch.is_empty() {
            return 0;
        }
        let started = Instant::now();
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0_u32;
        loop {
            match self.store.insert_events(&batch) {
                Ok(inserted) => {
                    self.metrics.record_counter(PlaneCounter::BufferFlushed, inserted);
                    self.metrics.record_latency(PlaneOp::EventFlush, started.elapsed());
                    return inserted;
                }
                Err(error) if error.is_retryable() && attempt < self.config.max_flush_retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(_) => {
                    let lost = u64::try_from(batch.len()).unwrap_or(u64::MAX);
                    self.dropped_total.fetch_add(lost, Ordering::Relaxed);
                    self.metrics.record_counter(PlaneCounter::BufferDropped, lost);
                    return 0;
                }
            }
        }
    }

    /// Drains the buffer, refusing new offers.
    ///
    /// Blocks until the queue is empty or the deadline passes, whichever is
    /// first. Events still queued at the deadline are reported as dropped.
    pub async fn drain(&self, deadline: Duration) -> DrainOutcome {
        {
            let mut state =
                self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.closed = true;
        }
        let mut outcome = DrainOutcome::default();
        let drained = tokio::time::timeout(deadline, async {
            let mut flushed = 0_u64;
            while !self.is_empty() {
                flushed += self.flush_once().await;
            }
            flushed
        })
        .await;
        match drained {
            Ok(flushed) => outcome.flushed = flushed,
            Err(_) => {
                outcome.deadline_hit = true;
                outcome.dropped = u64::try_from(self.len()).unwrap_or(u64::MAX);
            }
        }
        self.audit.record_drain(&DrainAuditEvent::new(
            "event_buffer",
            outcome.flushed,
            outcome.dropped,
            outcome.deadline_hit,
        ));
        outcome
    }

    /// Spawns the background flusher task.
    ///
    /// The task flushes on the timer, on threshold wake-ups, and once more
    /// when the shutdown signal flips before exiting.
    #[must_use]
    pub fn spawn_flusher(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let buffer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(buffer.config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        buffer.flush_once().await;
                    }
                    () = buffer.notify.notified() => {
                        buffer.flush_once().await;
                    }
                    changed = shutdown.changed() => {
                        let stop = changed.is_err() || *shutdown.borrow();
                        if stop {
                            buffer.flush_once().await;
                            break;
                        }
                    }
                }
            }
        })
    }
}
