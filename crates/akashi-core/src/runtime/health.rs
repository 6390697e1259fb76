// crates/akashi-core/src/runtime/health.rs
// ============================================================================
// Module: Akashi Health Surface
// Description: Readiness and liveness reporting for the decision plane.
// Purpose: Combine store reachability with worker freshness into one report.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The service is `ready` when the store answers a trivial query, the outbox
//! worker polled within twice its poll interval, and the conflict projection
//! refreshed within twice its refresh interval. Liveness is simply the
//! process running. Workers record their freshness into a shared
//! [`HealthState`]; the report computes staleness from the same clock the
//! workers use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::stores::StoreHealth;

// ============================================================================
// SECTION: Health State
// ============================================================================

/// Shared freshness registry written by the background workers.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Unix microseconds of the last outbox poll; `0` means never.
    last_outbox_poll_micros: AtomicI64,
    /// Unix microseconds of the last conflict refresh; `0` means never.
    last_conflict_refresh_micros: AtomicI64,
}

impl HealthState {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records an outbox poll instant.
    pub fn record_outbox_poll(&self, now: Timestamp) {
        self.last_outbox_poll_micros.store(now.unix_micros(), Ordering::Relaxed);
    }

    /// Records a conflict refresh instant.
    pub fn record_conflict_refresh(&self, now: Timestamp) {
        self.last_conflict_refresh_micros.store(now.unix_micros(), Ordering::Relaxed);
    }

    /// Returns the last outbox poll instant, when one happened.
    #[must_use]
    pub fn last_outbox_poll(&self) -> Option<Timestamp> {
        match self.last_outbox_poll_micros.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Timestamp::from_unix_micros(micros)),
        }
    }

    /// Returns the last conflict refresh instant, when one happened.
    #[must_use]
    pub fn last_conflict_refresh(&self) -> Option<Timestamp> {
        match self.last_conflict_refresh_micros.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Timestamp::from_unix_micros(micros)),
        }
    }
}

// ============================================================================
// SECTION: Readiness Report
// ============================================================================

/// Readiness probe result with per-component detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Overall readiness.
    pub ready: bool,
    /// Whether the store answered the probe.
    pub store_reachable: bool,
    /// Whether the outbox worker polled recently enough.
    pub outbox_fresh: bool,
    /// Whether the conflict projection refreshed recently enough.
    pub conflicts_fresh: bool,
    /// Age of the last outbox poll in microseconds, when one happened.
    pub outbox_poll_age_micros: Option<i64>,
    /// Age of the last conflict refresh in microseconds, when one happened.
    pub conflict_refresh_age_micros: Option<i64>,
}

/// Health service combining the store probe with worker freshness.
pub struct HealthService<S> {
    /// Store readiness probe.
    store: Arc<S>,
    /// Shared freshness registry.
    state: Arc<HealthState>,
    /// Clock seam.
    clock: Arc<dyn Clock>,
    /// Outbox worker poll interval.
    poll_interval: Duration,
    /// Conflict refresh interval.
    refresh_interval: Duration,
}

impl<S: StoreHealth> HealthService<S> {
    /// Creates a new health service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        state: Arc<HealthState>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            state,
            clock,
            poll_interval,
            refresh_interval,
        }
    }

    /// Returns whether the process is alive.
    #[must_use]
    pub const fn live(&self) -> bool {
        true
    }

    /// Computes the readiness report.
    #[must_use]
    pub fn ready(&self) -> ReadinessReport {
        let now = self.clock.now();
        let store_reachable = self.store.readiness().is_ok();
        let (outbox_fresh, outbox_poll_age_micros) =
            freshness(self.state.last_outbox_poll(), now, self.poll_interval);
        let (conflicts_fresh, conflict_refresh_age_micros) =
            freshness(self.state.last_conflict_refresh(), now, self.refresh_interval);
        ReadinessReport {
            ready: store_reachable && outbox_fresh && conflicts_fresh,
            store_reachable,
            outbox_fresh,
            conflicts_fresh,
            outbox_poll_age_micros,
            conflict_refresh_age_micros,
        }
    }
}

/// Computes freshness against twice the expected interval.
fn freshness(last: Option<Timestamp>, now: Timestamp, interval: Duration) -> (bool, Option<i64>) {
    let Some(last) = last else {
        return (false, None);
    };
    let age = now.unix_micros().saturating_sub(last.unix_micros());
    let budget = i64::try_from(interval.as_micros().saturating_mul(2)).unwrap_or(i64::MAX);
    (age <= budget, Some(age))
}
