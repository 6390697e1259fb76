// crates/akashi-core/src/runtime/memory.rs
// ============================================================================
// Module: Akashi In-Memory Store
// Description: Complete in-memory implementation of the store seams.
// Purpose: Back tests and embedded hosts without a relational backend.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryStore`] implements every store capability trait behind one
//! mutex, which makes each coarse operation atomic exactly like the SQLite
//! gateway's transactions. Two small fault knobs exist for tests: scheduled
//! event-insert failures (exercising buffer retry) and a readiness toggle
//! (exercising the health surface).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::Value;

use crate::core::agent::Agent;
use crate::core::agent::Organization;
use crate::core::conflict::Conflict;
use crate::core::conflict::ConflictFilter;
use crate::core::conflict::ConflictKind;
use crate::core::conflict::ConflictPage;
use crate::core::decision::Alternative;
use crate::core::decision::Decision;
use crate::core::decision::DecisionQualityStats;
use crate::core::decision::Evidence;
use crate::core::decision::EvidenceCoverageStats;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::RunId;
use crate::core::idempotency::IdempotencyRecord;
use crate::core::idempotency::IdempotencyState;
use crate::core::merkle::IntegrityProof;
use crate::core::outbox::OutboxEntry;
use crate::core::outbox::OutboxOperation;
use crate::core::run::AgentEvent;
use crate::core::run::AgentRun;
use crate::core::run::RunStatus;
use crate::core::time::Timestamp;
use crate::interfaces::stores::AgentStore;
use crate::interfaces::stores::DecisionStore;
use crate::interfaces::stores::EventStore;
use crate::interfaces::stores::IdempotencyBegin;
use crate::interfaces::stores::IdempotencyStore;
use crate::interfaces::stores::OutboxStore;
use crate::interfaces::stores::ProofStore;
use crate::interfaces::stores::RunStore;
use crate::interfaces::stores::StoreError;
use crate::interfaces::stores::StoreHealth;
use crate::interfaces::stores::TraceOutcome;
use crate::interfaces::stores::TraceStore;
use crate::interfaces::stores::TraceWrite;
use crate::interfaces::stores::UsageStore;

// ============================================================================
// SECTION: State
// ============================================================================

/// One row of the current-decision projection.
#[derive(Debug, Clone)]
struct ProjectionRow {
    /// Owning organization.
    org_id: OrgId,
    /// Logical agent.
    agent: AgentName,
    /// Decision type label.
    decision_type: String,
    /// Current decision revision.
    decision_id: DecisionId,
    /// Current outcome.
    outcome: String,
    /// Most recent superseded revision of the same key, when any.
    prior: Option<(DecisionId, String)>,
    /// Projection rebuild instant.
    refreshed_at: Timestamp,
}

/// Mutable state behind the store mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Organizations by id.
    orgs: BTreeMap<OrgId, Organization>,
    /// Agents by `(org, name)`.
    agents: BTreeMap<(OrgId, AgentName), Agent>,
    /// Runs by id.
    runs: BTreeMap<RunId, AgentRun>,
    /// Decision revisions by id.
    decisions: BTreeMap<DecisionId, Decision>,
    /// Alternatives per decision.
    alternatives: BTreeMap<DecisionId, Vec<Alternative>>,
    /// Evidence per decision.
    evidence: BTreeMap<DecisionId, Vec<Evidence>>,
    /// Events in arrival order.
    events: Vec<AgentEvent>,
    /// Seen `(run, sequence)` pairs for duplicate suppression.
    event_keys: BTreeSet<(RunId, u64)>,
    /// Outbox entries by id.
    outbox: BTreeMap<i64, OutboxEntry>,
    /// Next outbox identifier.
    next_outbox_id: i64,
    /// Idempotency records by `(org, key)`.
    idempotency: BTreeMap<(OrgId, String), IdempotencyRecord>,
    /// Usage counters by `(org, period)`.
    usage: BTreeMap<(OrgId, String), u64>,
    /// Stored integrity proofs in creation order.
    proofs: Vec<IntegrityProof>,
    /// Current-decision projection rows.
    projection: Vec<ProjectionRow>,
    /// Scheduled event-insert failures for tests.
    event_insert_failures: u32,
}

/// In-memory decision plane store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// All state behind one mutex; one lock per coarse operation.
    state: Mutex<MemoryState>,
    /// When set, readiness probes fail.
    fail_readiness: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the next `count` event inserts to fail as transient.
    pub fn set_event_insert_failures(&self, count: u32) {
        self.lock().event_insert_failures = count;
    }

    /// Toggles readiness probe failure.
    pub fn set_fail_readiness(&self, fail: bool) {
        self.fail_readiness.store(fail, Ordering::Relaxed);
    }

    /// Locks the state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Trace Store
// ============================================================================

impl TraceStore for InMemoryStore {
    fn create_trace(&self, write: &TraceWrite) -> Result<TraceOutcome, StoreError> {
        let mut state = self.lock();

        if write.quota_limit > 0 {
            let count = state
                .usage
                .get(&(write.org_id.clone(), write.period.clone()))
                .copied()
                .unwrap_or(0);
            if count >= write.quota_limit {
                return Err(StoreError::QuotaExceeded {
                    limit: write.quota_limit,
                    count,
                });
            }
        }

        if let Some(run) = &write.create_run {
            if state.runs.contains_key(&run.id) {
                return Err(StoreError::Conflict(format!("run {} exists", run.id)));
            }
            state.runs.insert(run.id, run.clone());
        } else if !state.runs.contains_key(&write.decision.run_id) {
            return Err(StoreError::NotFound(format!("run {}", write.decision.run_id)));
        }

        // Close the predecessor unconditionally so at most one revision per
        // logical key is ever current.
        let superseded = state
            .decisions
            .values_mut()
            .find(|existing| {
                existing.valid_to.is_none()
                    && existing.org_id == write.org_id
                    && existing.agent == write.decision.agent
                    && existing.decision_type == write.decision.decision_type
            })
            .map(|existing| {
                existing.valid_to = Some(write.decision.valid_from);
                existing.id
            });

        if state.decisions.contains_key(&write.decision.id) {
            return Err(StoreError::Conflict(format!("decision {} exists", write.decision.id)));
        }
        state.decisions.insert(write.decision.id, write.decision.clone());
        state.alternatives.insert(write.decision.id, write.alternatives.clone());
        state.evidence.insert(write.decision.id, write.evidence.clone());

        let entry_id = state.next_outbox_id;
        state.next_outbox_id += 1;
        state.outbox.insert(
            entry_id,
            OutboxEntry {
                id: entry_id,
                decision_id: write.decision.id,
                org_id: write.org_id.clone(),
                operation: OutboxOperation::Upsert,
                attempts: 0,
                locked_until: None,
                last_error: None,
                created_at: write.now,
            },
        );

        *state.usage.entry((write.org_id.clone(), write.period.clone())).or_insert(0) += 1;

        if let Some((key, snapshot)) = &write.idempotency {
            let record = IdempotencyRecord {
                key: key.clone(),
                org_id: write.org_id.clone(),
                state: IdempotencyState::Completed,
                response_snapshot: Some(snapshot.clone()),
                created_at: write.now,
                completed_at: Some(write.now),
                expires_at: write.now.plus_seconds(IdempotencyState::Completed.ttl_seconds()),
            };
            state.idempotency.insert((write.org_id.clone(), key.as_str().to_string()), record);
        }

        Ok(TraceOutcome {
            decision_id: write.decision.id,
            run_id: write.decision.run_id,
            superseded,
        })
    }
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

impl DecisionStore for InMemoryStore {
    fn current_decision(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
    ) -> Result<Option<Decision>, StoreError> {
        let state = self.lock();
        Ok(state
            .decisions
            .values()
            .find(|decision| {
                decision.valid_to.is_none()
                    && &decision.org_id == org_id
                    && &decision.agent == agent
                    && decision.decision_type == decision_type
            })
            .cloned())
    }

    fn get_decision(
        &self,
        org_id: &OrgId,
        id: DecisionId,
    ) -> Result<Option<Decision>, StoreError> {
        let state = self.lock();
        Ok(state.decisions.get(&id).filter(|decision| &decision.org_id == org_id).cloned())
    }

    fn current_decisions_with_embeddings(
        &self,
        ids: &[DecisionId],
    ) -> Result<Vec<Decision>, StoreError> {
        let state = self.lock();
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        Ok(state
            .decisions
            .values()
            .filter(|decision| {
                wanted.contains(&decision.id)
                    && decision.valid_to.is_none()
                    && decision.embedding.is_some()
            })
            .cloned()
            .collect())
    }

    fn list_current(
        &self,
        org_id: &OrgId,
        decision_type: &str,
        agent: Option<&AgentName>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let state = self.lock();
        let mut matches: Vec<Decision> = state
            .decisions
            .values()
            .filter(|decision| {
                decision.valid_to.is_none()
                    && &decision.org_id == org_id
                    && decision.decision_type == decision_type
                    && agent.is_none_or(|wanted| &decision.agent == wanted)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.transaction_time.cmp(&a.transaction_time));
        matches.truncate(limit);
        Ok(matches)
    }

    fn decisions_as_of(
        &self,
        org_id: &OrgId,
        instant: Timestamp,
        decision_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let state = self.lock();
        let mut matches: Vec<Decision> = state
            .decisions
            .values()
            .filter(|decision| {
                &decision.org_id == org_id
                    && decision.valid_from <= instant
                    && decision.valid_to.is_none_or(|closed| instant < closed)
                    && decision_type.is_none_or(|wanted| decision.decision_type == wanted)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.valid_from.cmp(&a.valid_from));
        matches.truncate(limit);
        Ok(matches)
    }

    fn recent_decisions(
        &self,
        org_id: &OrgId,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let state = self.lock();
        let mut matches: Vec<Decision> = state
            .decisions
            .values()
            .filter(|decision| decision.valid_to.is_none() && &decision.org_id == org_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.transaction_time.cmp(&a.transaction_time));
        matches.truncate(limit);
        Ok(matches)
    }

    fn alternatives_for(&self, decision_id: DecisionId) -> Result<Vec<Alternative>, StoreError> {
        Ok(self.lock().alternatives.get(&decision_id).cloned().unwrap_or_default())
    }

    fn evidence_for(&self, decision_id: DecisionId) -> Result<Vec<Evidence>, StoreError> {
        Ok(self.lock().evidence.get(&decision_id).cloned().unwrap_or_default())
    }

    fn supersede(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
        new_valid_from: Timestamp,
    ) -> Result<Option<DecisionId>, StoreError> {
        let mut state = self.lock();
        Ok(state
            .decisions
            .values_mut()
            .find(|decision| {
                decision.valid_to.is_none()
                    && &decision.org_id == org_id
                    && &decision.agent == agent
                    && decision.decision_type == decision_type
            })
            .map(|decision| {
                decision.valid_to = Some(new_valid_from);
                decision.id
            }))
    }

    fn delete_decision(
        &self,
        org_id: &OrgId,
        id: DecisionId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let owned = state
            .decisions
            .get(&id)
            .is_some_and(|decision| &decision.org_id == org_id);
        if !owned {
            return Err(StoreError::NotFound(format!("decision {id}")));
        }
        state.decisions.remove(&id);
        state.alternatives.remove(&id);
        state.evidence.remove(&id);
        let entry_id = state.next_outbox_id;
        state.next_outbox_id += 1;
        state.outbox.insert(
            entry_id,
            OutboxEntry {
                id: entry_id,
                decision_id: id,
                org_id: org_id.clone(),
                operation: OutboxOperation::Delete,
                attempts: 0,
                locked_until: None,
                last_error: None,
                created_at: now,
            },
        );
        Ok(())
    }

    fn refresh_conflicts(&self, now: Timestamp) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut rows = Vec::new();
        let current: Vec<Decision> =
            state.decisions.values().filter(|d| d.valid_to.is_none()).cloned().collect();
        for decision in current {
            let prior = state
                .decisions
                .values()
                .filter(|candidate| {
                    candidate.valid_to.is_some()
                        && candidate.org_id == decision.org_id
                        && candidate.agent == decision.agent
                        && candidate.decision_type == decision.decision_type
                })
                .max_by_key(|candidate| candidate.valid_to)
                .map(|candidate| (candidate.id, candidate.outcome.clone()));
            rows.push(ProjectionRow {
                org_id: decision.org_id.clone(),
                agent: decision.agent.clone(),
                decision_type: decision.decision_type.clone(),
                decision_id: decision.id,
                outcome: decision.outcome.clone(),
                prior,
                refreshed_at: now,
            });
        }
        state.projection = rows;
        Ok(())
    }

    fn count_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
    ) -> Result<u64, StoreError> {
        let conflicts = self.derive_conflicts(org_id, filter);
        Ok(u64::try_from(conflicts.len()).unwrap_or(u64::MAX))
    }

    fn list_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
        limit: usize,
        offset: usize,
    ) -> Result<ConflictPage, StoreError> {
        let conflicts = self.derive_conflicts(org_id, filter);
        let total = u64::try_from(conflicts.len()).unwrap_or(u64::MAX);
        let items = conflicts.into_iter().skip(offset).take(limit).collect();
        Ok(ConflictPage {
            items,
            total,
        })
    }

    fn decision_quality_stats(
        &self,
        org_id: &OrgId,
    ) -> Result<DecisionQualityStats, StoreError> {
        let state = self.lock();
        let current: Vec<&Decision> = state
            .decisions
            .values()
            .filter(|decision| decision.valid_to.is_none() && &decision.org_id == org_id)
            .collect();
        let total = current.len();
        if total == 0 {
            return Ok(DecisionQualityStats::default());
        }
        let count = total as f64;
        let confidence: f64 = current.iter().map(|decision| decision.confidence).sum();
        let quality: f64 = current.iter().map(|decision| decision.quality_score).sum();
        Ok(DecisionQualityStats {
            total_decisions: u64::try_from(total).unwrap_or(u64::MAX),
            average_confidence: confidence / count,
            average_quality: quality / count,
        })
    }

    fn evidence_coverage_stats(
        &self,
        org_id: &OrgId,
    ) -> Result<EvidenceCoverageStats, StoreError> {
        let state = self.lock();
        let current: Vec<&Decision> = state
            .decisions
            .values()
            .filter(|decision| decision.valid_to.is_none() && &decision.org_id == org_id)
            .collect();
        let total = current.len();
        if total == 0 {
            return Ok(EvidenceCoverageStats::default());
        }
        let with_evidence = current
            .iter()
            .filter(|decision| {
                state.evidence.get(&decision.id).is_some_and(|items| !items.is_empty())
            })
            .count();
        Ok(EvidenceCoverageStats {
            total_decisions: u64::try_from(total).unwrap_or(u64::MAX),
            with_evidence: u64::try_from(with_evidence).unwrap_or(u64::MAX),
            coverage: with_evidence as f64 / total as f64,
        })
    }
}

impl InMemoryStore {
    /// Derives conflicts for one organization from the projection.
    fn derive_conflicts(&self, org_id: &OrgId, filter: &ConflictFilter) -> Vec<Conflict> {
        let state = self.lock();
        let rows: Vec<&ProjectionRow> =
            state.projection.iter().filter(|row| &row.org_id == org_id).collect();
        let mut conflicts = Vec::new();
        for (index, row_a) in rows.iter().enumerate() {
            for row_b in rows.iter().skip(index + 1) {
                if row_a.decision_type == row_b.decision_type
                    && row_a.agent != row_b.agent
                    && row_a.outcome != row_b.outcome
                {
                    // Normalize pair order by decision id so each unordered
                    // pair appears once.
                    let (first, second) = if row_a.decision_id <= row_b.decision_id {
                        (row_a, row_b)
                    } else {
                        (row_b, row_a)
                    };
                    conflicts.push(Conflict {
                        org_id: org_id.clone(),
                        decision_type: first.decision_type.clone(),
                        kind: ConflictKind::CrossAgent,
                        decision_a: first.decision_id,
                        agent_a: first.agent.clone(),
                        outcome_a: first.outcome.clone(),
                        decision_b: second.decision_id,
                        agent_b: second.agent.clone(),
                        outcome_b: second.outcome.clone(),
                        detected_at: first.refreshed_at,
                    });
                }
            }
            if let Some((prior_id, prior_outcome)) = &row_a.prior
                && prior_outcome != &row_a.outcome
            {
                conflicts.push(Conflict {
                    org_id: org_id.clone(),
                    decision_type: row_a.decision_type.clone(),
                    kind: ConflictKind::SelfContradiction,
                    decision_a: row_a.decision_id,
                    agent_a: row_a.agent.clone(),
                    outcome_a: row_a.outcome.clone(),
                    decision_b: *prior_id,
                    agent_b: row_a.agent.clone(),
                    outcome_b: prior_outcome.clone(),
                    detected_at: row_a.refreshed_at,
                });
            }
        }
        conflicts.retain(|conflict| {
            filter
                .decision_type
                .as_ref()
                .is_none_or(|wanted| &conflict.decision_type == wanted)
                && filter.kind.is_none_or(|wanted| conflict.kind == wanted)
                && filter
                    .agent
                    .as_ref()
                    .is_none_or(|wanted| &conflict.agent_a == wanted || &conflict.agent_b == wanted)
        });
        conflicts.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| a.decision_a.cmp(&b.decision_a))
                .then_with(|| a.decision_b.cmp(&b.decision_b))
        });
        conflicts
    }
}

// ============================================================================
// SECTION: Outbox Store
// ============================================================================

impl OutboxStore for InMemoryStore {
    fn enqueue_outbox(
        &self,
        decision_id: DecisionId,
        org_id: &OrgId,
        operation: OutboxOperation,
        now: Timestamp,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let entry_id = state.next_outbox_id;
        state.next_outbox_id += 1;
        state.outbox.insert(
            entry_id,
            OutboxEntry {
                id: entry_id,
                decision_id,
                org_id: org_id.clone(),
                operation,
                attempts: 0,
                locked_until: None,
                last_error: None,
                created_at: now,
            },
        );
        Ok(entry_id)
    }

    fn claim_outbox_batch(
        &self,
        batch_size: usize,
        now: Timestamp,
        locked_until: Timestamp,
        max_attempts: u32,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut state = self.lock();
        let mut eligible: Vec<i64> = state
            .outbox
            .values()
            .filter(|entry| {
                entry.attempts < max_attempts
                    && entry.locked_until.is_none_or(|lease| lease < now)
            })
            .map(|entry| entry.id)
            .collect();
        eligible.sort_by_key(|id| {
            state.outbox.get(id).map_or((Timestamp::default(), 0), |e| (e.created_at, e.id))
        });
        eligible.truncate(batch_size);
        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            if let Some(entry) = state.outbox.get_mut(&id) {
                entry.locked_until = Some(locked_until);
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    fn ack_outbox(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.lock();
        for id in ids {
            state.outbox.remove(id);
        }
        Ok(())
    }

    fn fail_outbox(&self, entries: &[(i64, Timestamp)], error: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        for (id, retry_at) in entries {
            if let Some(entry) = state.outbox.get_mut(id) {
                entry.attempts = entry.attempts.saturating_add(1);
                entry.last_error = Some(error.to_string());
                entry.locked_until = Some(*retry_at);
            }
        }
        Ok(())
    }

    fn outbox_depth(&self, max_attempts: u32) -> Result<u64, StoreError> {
        let state = self.lock();
        let depth =
            state.outbox.values().filter(|entry| entry.attempts < max_attempts).count();
        Ok(u64::try_from(depth).unwrap_or(u64::MAX))
    }

    fn dead_letter_count(&self, max_attempts: u32) -> Result<u64, StoreError> {
        let state = self.lock();
        let count =
            state.outbox.values().filter(|entry| entry.attempts >= max_attempts).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn sweep_dead_letters(
        &self,
        cutoff: Timestamp,
        max_attempts: u32,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let doomed: Vec<i64> = state
            .outbox
            .values()
            .filter(|entry| entry.attempts >= max_attempts && entry.created_at < cutoff)
            .map(|entry| entry.id)
            .collect();
        for id in &doomed {
            state.outbox.remove(id);
        }
        Ok(u64::try_from(doomed.len()).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

impl UsageStore for InMemoryStore {
    fn usage(&self, org_id: &OrgId, period: &str) -> Result<u64, StoreError> {
        let state = self.lock();
        Ok(state.usage.get(&(org_id.clone(), period.to_string())).copied().unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

impl IdempotencyStore for InMemoryStore {
    fn begin_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<IdempotencyBegin, StoreError> {
        let mut state = self.lock();
        let map_key = (org_id.clone(), key.as_str().to_string());
        if let Some(existing) = state.idempotency.get(&map_key) {
            match existing.state {
                IdempotencyState::Completed if !existing.is_expired(now) => {
                    let snapshot =
                        existing.response_snapshot.clone().unwrap_or(Value::Null);
                    return Ok(IdempotencyBegin::Replayed(snapshot));
                }
                IdempotencyState::InProgress if !existing.is_expired(now) => {
                    return Ok(IdempotencyBegin::InFlight);
                }
                _ => {}
            }
        }
        state.idempotency.insert(
            map_key,
            IdempotencyRecord {
                key: key.clone(),
                org_id: org_id.clone(),
                state: IdempotencyState::InProgress,
                response_snapshot: None,
                created_at: now,
                completed_at: None,
                expires_at: now.plus_seconds(IdempotencyState::InProgress.ttl_seconds()),
            },
        );
        Ok(IdempotencyBegin::Started)
    }

    fn abandon_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let map_key = (org_id.clone(), key.as_str().to_string());
        let record = state
            .idempotency
            .get_mut(&map_key)
            .ok_or_else(|| StoreError::NotFound(format!("idempotency key {key}")))?;
        record.state = IdempotencyState::Abandoned;
        record.expires_at = now.plus_seconds(IdempotencyState::Abandoned.ttl_seconds());
        Ok(())
    }

    fn get_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let state = self.lock();
        Ok(state.idempotency.get(&(org_id.clone(), key.as_str().to_string())).cloned())
    }

    fn sweep_idempotency_keys(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.idempotency.len();
        state.idempotency.retain(|_, record| !record.is_expired(now));
        let removed = before - state.idempotency.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

impl EventStore for InMemoryStore {
    fn insert_events(&self, events: &[AgentEvent]) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if state.event_insert_failures > 0 {
            state.event_insert_failures -= 1;
            return Err(StoreError::Unavailable("scheduled event insert failure".into()));
        }
        let mut inserted = 0_u64;
        for event in events {
            if state.event_keys.insert((event.run_id, event.sequence_num)) {
                state.events.push(event.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn events_for_run(
        &self,
        run_id: RunId,
        limit: usize,
    ) -> Result<Vec<AgentEvent>, StoreError> {
        let state = self.lock();
        let mut matches: Vec<AgentEvent> =
            state.events.iter().filter(|event| event.run_id == run_id).cloned().collect();
        matches.sort_by_key(|event| event.sequence_num);
        matches.truncate(limit);
        Ok(matches)
    }
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

impl RunStore for InMemoryStore {
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.runs.contains_key(&run.id) {
            return Err(StoreError::Conflict(format!("run {} exists", run.id)));
        }
        state.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn get_run(&self, org_id: &OrgId, run_id: RunId) -> Result<Option<AgentRun>, StoreError> {
        let state = self.lock();
        Ok(state.runs.get(&run_id).filter(|run| &run.org_id == org_id).cloned())
    }

    fn complete_run(
        &self,
        org_id: &OrgId,
        run_id: RunId,
        status: RunStatus,
        completed_at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .filter(|run| &run.org_id == org_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = status;
        run.completed_at = Some(completed_at);
        Ok(())
    }
}

// ============================================================================
// SECTION: Agent Store
// ============================================================================

impl AgentStore for InMemoryStore {
    fn put_org(&self, org: &Organization) -> Result<(), StoreError> {
        self.lock().orgs.insert(org.id.clone(), org.clone());
        Ok(())
    }

    fn get_org(&self, org_id: &OrgId) -> Result<Option<Organization>, StoreError> {
        Ok(self.lock().orgs.get(org_id).cloned())
    }

    fn put_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        self.lock().agents.insert((agent.org_id.clone(), agent.name.clone()), agent.clone());
        Ok(())
    }

    fn get_agent(
        &self,
        org_id: &OrgId,
        name: &AgentName,
    ) -> Result<Option<Agent>, StoreError> {
        Ok(self.lock().agents.get(&(org_id.clone(), name.clone())).cloned())
    }

    fn count_agents(&self, org_id: &OrgId) -> Result<u64, StoreError> {
        let state = self.lock();
        let count = state.agents.keys().filter(|(org, _)| org == org_id).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Proof Store
// ============================================================================

impl ProofStore for InMemoryStore {
    fn content_hashes_in_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.lock();
        Ok(state
            .decisions
            .values()
            .filter(|decision| {
                start <= decision.transaction_time && decision.transaction_time < end
            })
            .map(|decision| decision.content_hash.clone())
            .collect())
    }

    fn put_proof(&self, proof: &IntegrityProof) -> Result<(), StoreError> {
        self.lock().proofs.push(proof.clone());
        Ok(())
    }

    fn latest_proof(&self) -> Result<Option<IntegrityProof>, StoreError> {
        Ok(self.lock().proofs.last().cloned())
    }
}

// ============================================================================
// SECTION: Health
// ============================================================================

impl StoreHealth for InMemoryStore {
    fn readiness(&self) -> Result<(), StoreError> {
        if self.fail_readiness.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("readiness toggled off".into()));
        }
        Ok(())
    }
}
