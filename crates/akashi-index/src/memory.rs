// crates/akashi-index/src/memory.rs
// ============================================================================
// Module: In-Memory Vector Index
// Description: Test double for the vector index contract.
// Purpose: Record calls and inject faults for outbox worker tests.
// Dependencies: akashi-core
// ============================================================================

//! ## Overview
//! The in-memory index stores points in a map keyed by decision id, exactly
//! mirroring the id-keyed upsert convergence of the real index. A scheduled
//! failure counter makes the next N calls fail as retryable, which is how
//! outbox backoff and dead-letter tests drive the worker through its state
//! machine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use akashi_core::DecisionId;
use akashi_core::IndexError;
use akashi_core::IndexPoint;
use akashi_core::ScrollPage;
use akashi_core::VectorIndex;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable index state behind the mutex.
#[derive(Debug, Default)]
struct IndexState {
    /// Stored points by decision id.
    points: BTreeMap<DecisionId, IndexPoint>,
    /// Remaining scheduled retryable failures.
    scheduled_failures: u32,
    /// Total upsert calls observed.
    upsert_calls: u64,
    /// Total delete calls observed.
    delete_calls: u64,
}

/// In-memory [`VectorIndex`] with fault injection.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    /// All state behind one mutex.
    state: Mutex<IndexState>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the next `count` calls to fail as retryable.
    pub fn set_failures(&self, count: u32) {
        self.lock().scheduled_failures = count;
    }

    /// Returns the stored point for a decision, when present.
    #[must_use]
    pub fn point(&self, id: DecisionId) -> Option<IndexPoint> {
        self.lock().points.get(&id).cloned()
    }

    /// Returns the number of stored points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.lock().points.len()
    }

    /// Returns the number of upsert calls observed.
    #[must_use]
    pub fn upsert_calls(&self) -> u64 {
        self.lock().upsert_calls
    }

    /// Returns the number of delete calls observed.
    #[must_use]
    pub fn delete_calls(&self) -> u64 {
        self.lock().delete_calls
    }

    /// Locks the state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Consumes one scheduled failure, when any remain.
    fn take_failure(state: &mut IndexState) -> Result<(), IndexError> {
        if state.scheduled_failures > 0 {
            state.scheduled_failures -= 1;
            return Err(IndexError::Unavailable("scheduled index failure".to_string()));
        }
        Ok(())
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        let mut state = self.lock();
        state.upsert_calls += 1;
        Self::take_failure(&mut state)?;
        for point in points {
            state.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    fn delete_by_ids(&self, ids: &[DecisionId]) -> Result<(), IndexError> {
        let mut state = self.lock();
        state.delete_calls += 1;
        Self::take_failure(&mut state)?;
        for id in ids {
            state.points.remove(id);
        }
        Ok(())
    }

    fn scroll(&self, cursor: Option<&str>, limit: usize) -> Result<ScrollPage, IndexError> {
        let state = self.lock();
        let ids: Vec<DecisionId> = state
            .points
            .keys()
            .filter(|id| {
                cursor.is_none_or(|after| id.as_uuid().to_string().as_str() > after)
            })
            .take(limit)
            .copied()
            .collect();
        let next_cursor = if ids.len() == limit {
            ids.last().map(|id| id.as_uuid().to_string())
        } else {
            None
        };
        Ok(ScrollPage {
            ids,
            next_cursor,
        })
    }
}
