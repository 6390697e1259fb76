// crates/akashi-core/src/interfaces/stores.rs
// ============================================================================
// Module: Store Capability Interfaces
// Description: Narrow storage seams for the durable decision plane.
// Purpose: Keep the core testable against in-memory fakes and portable
//          across relational backends.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The decision plane never names a concrete database type. Each concern gets
//! a narrow capability trait; the SQLite gateway implements all of them and
//! tests substitute in-memory fakes. Coarse operations are transactional:
//! [`TraceStore::create_trace`] runs the quota check, supersession, decision
//! and child inserts, outbox enqueue, usage increment, and idempotency
//! completion as one atomic unit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::agent::Agent;
use crate::core::agent::Organization;
use crate::core::conflict::ConflictFilter;
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
use crate::core::merkle::IntegrityProof;
use crate::core::outbox::OutboxEntry;
use crate::core::outbox::OutboxOperation;
use crate::core::run::AgentEvent;
use crate::core::run::AgentRun;
use crate::core::run::RunStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage errors surfaced through every capability trait.
///
/// # Invariants
/// - [`StoreError::Unavailable`] is the only retryable variant; constraint
///   violations and domain failures are terminal for the calling request.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transient backend failure (connection loss, lock contention); the
    /// caller may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Unique or foreign-key constraint violation, or a lost idempotency
    /// race.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Monthly decision quota reached inside the trace transaction.
    #[error("quota exceeded: {count} of {limit} decisions used")]
    QuotaExceeded {
        /// Configured decision limit.
        limit: u64,
        /// Decisions already recorded this period.
        count: u64,
    },
    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid data reached the store boundary.
    #[error("invalid store data: {0}")]
    Invalid(String),
    /// Stored data failed an integrity check.
    #[error("store corruption: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns whether the caller may retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// ============================================================================
// SECTION: Trace Write
// ============================================================================

/// Fully-prepared trace write executed in one transaction.
///
/// The pipeline mints every identifier and computes the content hash before
/// the transaction opens, so the store only orders and persists.
#[derive(Debug, Clone)]
pub struct TraceWrite {
    /// Owning organization.
    pub org_id: OrgId,
    /// Logical agent recording the decision.
    pub agent: AgentName,
    /// Implicit run to insert first, when the caller did not name one.
    pub create_run: Option<AgentRun>,
    /// Decision revision to insert; `valid_to` must be `None`.
    pub decision: Decision,
    /// Alternatives created with the decision.
    pub alternatives: Vec<Alternative>,
    /// Evidence created with the decision.
    pub evidence: Vec<Evidence>,
    /// Idempotency key to mark completed, with its response snapshot.
    pub idempotency: Option<(IdempotencyKey, Value)>,
    /// Monthly decision limit; `0` disables enforcement.
    pub quota_limit: u64,
    /// Usage period in `YYYY-MM` form.
    pub period: String,
    /// Transaction instant.
    pub now: Timestamp,
}

/// Result of a committed trace write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOutcome {
    /// Inserted decision revision.
    pub decision_id: DecisionId,
    /// Run the decision was recorded under.
    pub run_id: RunId,
    /// Revision closed by supersession, when one existed.
    pub superseded: Option<DecisionId>,
}

/// Transactional entry point for trace ingestion.
pub trait TraceStore: Send + Sync {
    /// Executes the prepared trace write atomically.
    ///
    /// Supersedes the current revision for the logical key, enforces the
    /// quota against the period counter, enqueues the outbox upsert,
    /// increments usage, and completes the idempotency key, all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuotaExceeded`] when the period counter has
    /// reached the limit, [`StoreError::Conflict`] on constraint violations,
    /// and [`StoreError::Unavailable`] on transient backend failures.
    fn create_trace(&self, write: &TraceWrite) -> Result<TraceOutcome, StoreError>;
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

/// Reads and lifecycle operations over decision revisions.
pub trait DecisionStore: Send + Sync {
    /// Returns the current revision for a logical key, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn current_decision(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
    ) -> Result<Option<Decision>, StoreError>;

    /// Fetches one revision by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn get_decision(&self, org_id: &OrgId, id: DecisionId)
    -> Result<Option<Decision>, StoreError>;

    /// Fetches several current revisions by identifier, skipping ids that
    /// are superseded, deleted, or missing embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn current_decisions_with_embeddings(
        &self,
        ids: &[DecisionId],
    ) -> Result<Vec<Decision>, StoreError>;

    /// Lists current decisions of one type, optionally for one agent,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_current(
        &self,
        org_id: &OrgId,
        decision_type: &str,
        agent: Option<&AgentName>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError>;

    /// Lists revisions valid at `instant` (`valid_from <= t < valid_to`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn decisions_as_of(
        &self,
        org_id: &OrgId,
        instant: Timestamp,
        decision_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError>;

    /// Lists the most recently recorded current decisions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn recent_decisions(&self, org_id: &OrgId, limit: usize) -> Result<Vec<Decision>, StoreError>;

    /// Returns the alternatives recorded with a decision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn alternatives_for(&self, decision_id: DecisionId) -> Result<Vec<Alternative>, StoreError>;

    /// Returns the evidence recorded with a decision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn evidence_for(&self, decision_id: DecisionId) -> Result<Vec<Evidence>, StoreError>;

    /// Closes the current revision for a logical key.
    ///
    /// Returns the closed revision identifier, or `None` when no revision
    /// was current.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn supersede(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
        new_valid_from: Timestamp,
    ) -> Result<Option<DecisionId>, StoreError>;

    /// Deletes every revision of a decision and enqueues the index delete in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the decision does not exist.
    fn delete_decision(
        &self,
        org_id: &OrgId,
        id: DecisionId,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Rebuilds the current-decision projection used for conflict queries.
    ///
    /// Idempotent; called from the refresh ticker.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn refresh_conflicts(&self, now: Timestamp) -> Result<(), StoreError>;

    /// Counts conflicts matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn count_conflicts(&self, org_id: &OrgId, filter: &ConflictFilter)
    -> Result<u64, StoreError>;

    /// Lists conflicts matching the filter, sorted by detection instant
    /// descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
        limit: usize,
        offset: usize,
    ) -> Result<ConflictPage, StoreError>;

    /// Aggregates decision quality statistics for the health surface.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn decision_quality_stats(&self, org_id: &OrgId)
    -> Result<DecisionQualityStats, StoreError>;

    /// Aggregates evidence coverage statistics for the health surface.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn evidence_coverage_stats(
        &self,
        org_id: &OrgId,
    ) -> Result<EvidenceCoverageStats, StoreError>;
}

// ============================================================================
// SECTION: Outbox Store
// ============================================================================

/// Durable queue operations for the search outbox worker.
pub trait OutboxStore: Send + Sync {
    /// Enqueues an index operation for a decision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn enqueue_outbox(
        &self,
        decision_id: DecisionId,
        org_id: &OrgId,
        operation: OutboxOperation,
        now: Timestamp,
    ) -> Result<i64, StoreError>;

    /// Claims up to `batch_size` deliverable entries, oldest first.
    ///
    /// Deliverable means unlocked or lock-expired with attempts below
    /// `max_attempts`. Claimed entries are locked until `locked_until`
    /// before any network I/O happens, so a crashed worker's entries are
    /// reclaimed by lock expiry alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn claim_outbox_batch(
        &self,
        batch_size: usize,
        now: Timestamp,
        locked_until: Timestamp,
        max_attempts: u32,
    ) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Deletes entries after successful delivery.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn ack_outbox(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Records a failed delivery: increments attempts, stores the error, and
    /// reschedules each entry at its backoff instant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn fail_outbox(&self, entries: &[(i64, Timestamp)], error: &str) -> Result<(), StoreError>;

    /// Counts deliverable entries (attempts below `max_attempts`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn outbox_depth(&self, max_attempts: u32) -> Result<u64, StoreError>;

    /// Counts dead-lettered entries (attempts at or above `max_attempts`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn dead_letter_count(&self, max_attempts: u32) -> Result<u64, StoreError>;

    /// Deletes dead-lettered entries created before `cutoff`.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn sweep_dead_letters(&self, cutoff: Timestamp, max_attempts: u32)
    -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

/// Read access to the per-period usage ledger.
///
/// Increments happen exclusively inside [`TraceStore::create_trace`]; this
/// trait only observes.
pub trait UsageStore: Send + Sync {
    /// Returns the decision count for one organization and period.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn usage(&self, org_id: &OrgId, period: &str) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

/// Outcome of an idempotency begin attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyBegin {
    /// The key was inserted; the caller owns the request.
    Started,
    /// The key completed earlier; replay the cached response.
    Replayed(Value),
    /// Another request holds the key and has not expired.
    InFlight,
}

/// Deduplication authority for trace requests.
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claims a key or reports its standing state.
    ///
    /// Expired in-progress and abandoned rows are taken over in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn begin_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<IdempotencyBegin, StoreError>;

    /// Marks a key abandoned so its TTL shortens to the abandoned window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn abandon_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Fetches a key's record for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn get_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Deletes expired keys; returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn sweep_idempotency_keys(&self, now: Timestamp) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Batched persistence for high-volume agent events.
pub trait EventStore: Send + Sync {
    /// Inserts a batch of events in one statement, preserving order.
    ///
    /// Returns the number of rows inserted. Duplicate
    /// `(run_id, sequence_num)` pairs are skipped rather than failing the
    /// batch, so a retried flush never double-inserts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_events(&self, events: &[AgentEvent]) -> Result<u64, StoreError>;

    /// Lists events for one run in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn events_for_run(&self, run_id: RunId, limit: usize)
    -> Result<Vec<AgentEvent>, StoreError>;
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Run lifecycle persistence.
pub trait RunStore: Send + Sync {
    /// Inserts a run record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the run already exists.
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError>;

    /// Fetches a run owned by the organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn get_run(&self, org_id: &OrgId, run_id: RunId) -> Result<Option<AgentRun>, StoreError>;

    /// Transitions a run to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn complete_run(
        &self,
        org_id: &OrgId,
        run_id: RunId,
        status: RunStatus,
        completed_at: Timestamp,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Agent Store
// ============================================================================

/// Organization and agent registry persistence.
pub trait AgentStore: Send + Sync {
    /// Inserts or replaces an organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn put_org(&self, org: &Organization) -> Result<(), StoreError>;

    /// Fetches an organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn get_org(&self, org_id: &OrgId) -> Result<Option<Organization>, StoreError>;

    /// Inserts or replaces an agent registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn put_agent(&self, agent: &Agent) -> Result<(), StoreError>;

    /// Fetches an agent by logical name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn get_agent(&self, org_id: &OrgId, name: &AgentName) -> Result<Option<Agent>, StoreError>;

    /// Counts agents registered to an organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn count_agents(&self, org_id: &OrgId) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Proof Store
// ============================================================================

/// Integrity proof persistence and leaf queries.
pub trait ProofStore: Send + Sync {
    /// Returns the content hashes of revisions whose transaction time falls
    /// in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn content_hashes_in_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<String>, StoreError>;

    /// Persists a built integrity proof.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn put_proof(&self, proof: &IntegrityProof) -> Result<(), StoreError>;

    /// Returns the most recently created proof.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn latest_proof(&self) -> Result<Option<IntegrityProof>, StoreError>;
}

// ============================================================================
// SECTION: Health Probe
// ============================================================================

/// Store reachability probe for the readiness surface.
pub trait StoreHealth: Send + Sync {
    /// Verifies the backend can execute a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the backend is unreachable.
    fn readiness(&self) -> Result<(), StoreError>;
}

/// Composite seam implemented by full decision-plane backends.
pub trait DecisionPlaneStore:
    TraceStore
    + DecisionStore
    + OutboxStore
    + UsageStore
    + IdempotencyStore
    + EventStore
    + RunStore
    + AgentStore
    + ProofStore
    + StoreHealth
{
}

impl<S> DecisionPlaneStore for S where
    S: TraceStore
        + DecisionStore
        + OutboxStore
        + UsageStore
        + IdempotencyStore
        + EventStore
        + RunStore
        + AgentStore
        + ProofStore
        + StoreHealth
{
}
