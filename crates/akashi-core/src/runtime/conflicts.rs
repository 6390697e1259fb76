// crates/akashi-core/src/runtime/conflicts.rs
// ============================================================================
// Module: Akashi Conflict Refresher
// Description: Ticker keeping the current-decision projection fresh.
// Purpose: Bound conflict staleness without scanning history on reads.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! Conflict detection is a freshness problem: the projection maps each
//! `(org, agent, decision_type)` to its current decision, and queries derive
//! conflict pairs from it with an indexed scan. This refresher rebuilds the
//! projection on a ticker (default 30 s) and records the refresh instant for
//! the readiness surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::time::Clock;
use crate::interfaces::stores::DecisionStore;
use crate::interfaces::stores::StoreError;
use crate::interfaces::telemetry::MetricsSink;
use crate::interfaces::telemetry::PlaneOp;
use crate::runtime::health::HealthState;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default conflict refresh period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Background refresher for the conflict projection.
pub struct ConflictRefresher<S> {
    /// Store providing the projection rebuild.
    store: Arc<S>,
    /// Clock seam.
    clock: Arc<dyn Clock>,
    /// Freshness registry for the readiness surface.
    health: Arc<HealthState>,
    /// Metrics sink.
    metrics: Arc<dyn MetricsSink>,
    /// Refresh period.
    interval: Duration,
}

impl<S> ConflictRefresher<S>
where
    S: DecisionStore + Send + Sync + 'static,
{
    /// Creates a new refresher.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        health: Arc<HealthState>,
        metrics: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            health,
            metrics,
            interval,
        }
    }

    /// Runs one refresh and records freshness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; the instant is still
    /// recorded only on success so staleness surfaces real problems.
    pub fn refresh_once(&self) -> Result<(), StoreError> {
        let started = Instant::now();
        let now = self.clock.now();
        self.store.refresh_conflicts(now)?;
        self.health.record_conflict_refresh(now);
        self.metrics.record_latency(PlaneOp::ConflictRefresh, started.elapsed());
        Ok(())
    }

    /// Spawns the refresh loop.
    ///
    /// Refresh failures are absorbed; the next tick retries.
    #[must_use]
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = self.refresh_once();
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
