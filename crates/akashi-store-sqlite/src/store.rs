// crates/akashi-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Decision Plane Store
// Description: Durable store gateway backed by SQLite WAL.
// Purpose: Execute the coarse decision-plane operations as single
//          transactions over one writer connection and a read pool.
// Dependencies: akashi-core, rusqlite, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module implements every Akashi store capability over `SQLite`. Each
//! coarse operation is one transaction; writes use `BEGIN IMMEDIATE`, which
//! serialises writers and stands in for the row and advisory locks a server
//! database would use. The bi-temporal invariant is enforced twice: a
//! partial unique index keeps at most one current revision per logical key,
//! and supersession closes the predecessor inside the same transaction that
//! inserts the successor.
//!
//! The outbox claim commits its lock update before any network I/O happens,
//! so entries held by a crashed worker return to the pool by lock expiry
//! alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use akashi_core::Agent;
use akashi_core::AgentEvent;
use akashi_core::AgentId;
use akashi_core::AgentName;
use akashi_core::AgentRole;
use akashi_core::AgentRun;
use akashi_core::AgentStore;
use akashi_core::Alternative;
use akashi_core::BatchId;
use akashi_core::Conflict;
use akashi_core::ConflictFilter;
use akashi_core::ConflictKind;
use akashi_core::ConflictPage;
use akashi_core::Decision;
use akashi_core::DecisionId;
use akashi_core::DecisionQualityStats;
use akashi_core::DecisionStore;
use akashi_core::Evidence;
use akashi_core::EvidenceCoverageStats;
use akashi_core::EventStore;
use akashi_core::IdempotencyBegin;
use akashi_core::IdempotencyKey;
use akashi_core::IdempotencyRecord;
use akashi_core::IdempotencyStore;
use akashi_core::IdempotencyState;
use akashi_core::IntegrityProof;
use akashi_core::OrgId;
use akashi_core::Organization;
use akashi_core::OutboxEntry;
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
use akashi_core::TraceOutcome;
use akashi_core::TraceStore;
use akashi_core::TraceWrite;
use akashi_core::UsageStore;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` decision plane store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw decision payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Database busy or locked; the caller may retry.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Unique or foreign-key constraint violation.
    #[error("sqlite store constraint violation: {0}")]
    Constraint(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message)
            | SqliteStoreError::Db(message)
            | SqliteStoreError::Busy(message) => Self::Unavailable(message),
            SqliteStoreError::Constraint(message) => Self::Conflict(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Classifies a `rusqlite` error into a store error.
fn map_sql_err(error: &rusqlite::Error) -> SqliteStoreError {
    if let Some(code) = error.sqlite_error_code() {
        match code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return SqliteStoreError::Busy(error.to_string());
            }
            ErrorCode::ConstraintViolation => {
                return SqliteStoreError::Constraint(error.to_string());
            }
            _ => {}
        }
    }
    SqliteStoreError::Db(error.to_string())
}

/// Shorthand converting a `rusqlite` error straight to a [`StoreError`].
fn store_err(error: rusqlite::Error) -> StoreError {
    StoreError::from(map_sql_err(&error))
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed decision plane store with WAL support.
///
/// # Invariants
/// - Mutations go through one writer connection guarded by a mutex.
/// - Reads round-robin over a pool of read-only connections.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteStore {
    /// Opens an `SQLite`-backed decision plane store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        ensure_parent_dir(&config.path)?;
        let write_connection = open_connection(config)?;
        initialize_schema(&write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Opens an in-memory store for tests and embedded hosts.
    ///
    /// The in-memory database is private to one connection, so reads share
    /// the writer connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when initialization fails.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory()
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            write_connection: Arc::new(Mutex::new(connection)),
            read_connections: Arc::new(Vec::new()),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Locks the writer connection.
    fn writer(&self) -> MutexGuard<'_, Connection> {
        self.write_connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Locks the next read connection using round-robin selection.
    ///
    /// Falls back to the writer connection for in-memory databases.
    fn reader(&self) -> MutexGuard<'_, Connection> {
        if self.read_connections.is_empty() {
            return self.writer();
        }
        let index =
            self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
        self.read_connections[index]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory of the database path exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens one configured connection.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let connection =
        Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| map_sql_err(&err))?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(|err| map_sql_err(&err))?;
    connection
        .pragma_update(None, "synchronous", config.sync_mode.pragma_value())
        .map_err(|err| map_sql_err(&err))?;
    connection
        .pragma_update(None, "foreign_keys", "on")
        .map_err(|err| map_sql_err(&err))?;
    Ok(connection)
}

/// Creates the schema and validates the stored version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS akashi_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                plan TEXT NOT NULL,
                decision_limit INTEGER NOT NULL,
                agent_limit INTEGER NOT NULL,
                stripe_customer_id TEXT,
                stripe_subscription_id TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL REFERENCES organizations (id),
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                api_key_hash TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (org_id, name)
            );
            CREATE TABLE IF NOT EXISTS agent_runs (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                status TEXT NOT NULL,
                parent_run_id TEXT,
                trace_id TEXT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                decision_type TEXT NOT NULL,
                outcome TEXT NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT,
                metadata TEXT NOT NULL,
                embedding TEXT,
                quality_score REAL NOT NULL,
                precedent_ref TEXT,
                valid_from INTEGER NOT NULL,
                valid_to INTEGER,
                transaction_time INTEGER NOT NULL,
                content_hash TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_decisions_current
                ON decisions (org_id, agent, decision_type)
                WHERE valid_to IS NULL;
            CREATE INDEX IF NOT EXISTS idx_decisions_type
                ON decisions (org_id, decision_type, valid_to);
            CREATE INDEX IF NOT EXISTS idx_decisions_transaction_time
                ON decisions (transaction_time);
            CREATE TABLE IF NOT EXISTS alternatives (
                id TEXT PRIMARY KEY,
                decision_id TEXT NOT NULL REFERENCES decisions (id) ON DELETE CASCADE,
                label TEXT NOT NULL,
                score REAL,
                selected INTEGER NOT NULL,
                rejection_reason TEXT,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alternatives_decision
                ON alternatives (decision_id);
            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                decision_id TEXT NOT NULL REFERENCES decisions (id) ON DELETE CASCADE,
                source_type TEXT NOT NULL,
                source_uri TEXT,
                content TEXT NOT NULL,
                relevance_score REAL,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_evidence_decision
                ON evidence (decision_id);
            CREATE TABLE IF NOT EXISTS agent_events (
                run_id TEXT NOT NULL,
                sequence_num INTEGER NOT NULL,
                org_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                event_type TEXT NOT NULL,
                occurred_at INTEGER NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (run_id, sequence_num)
            );
            CREATE TABLE IF NOT EXISTS search_outbox (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                decision_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                locked_until INTEGER,
                last_error TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_outbox_eligible
                ON search_outbox (attempts, locked_until, created_at);
            CREATE TABLE IF NOT EXISTS idempotency_keys (
                org_id TEXT NOT NULL,
                key TEXT NOT NULL,
                state TEXT NOT NULL,
                response_snapshot TEXT,
                created_at INTEGER NOT NULL,
                completed_at INTEGER,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (org_id, key)
            );
            CREATE TABLE IF NOT EXISTS usage_counters (
                org_id TEXT NOT NULL,
                period TEXT NOT NULL,
                decision_count INTEGER NOT NULL,
                PRIMARY KEY (org_id, period)
            );
            CREATE TABLE IF NOT EXISTS integrity_proofs (
                batch_id TEXT PRIMARY KEY,
                root_hash TEXT NOT NULL,
                leaf_count INTEGER NOT NULL,
                range_start INTEGER NOT NULL,
                range_end INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS current_decisions (
                org_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                decision_type TEXT NOT NULL,
                decision_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                prior_decision_id TEXT,
                prior_outcome TEXT,
                refreshed_at INTEGER NOT NULL,
                PRIMARY KEY (org_id, agent, decision_type)
            );",
        )
        .map_err(|err| map_sql_err(&err))?;
    let stored: Option<String> = connection
        .query_row(
            "SELECT value FROM akashi_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| map_sql_err(&err))?;
    match stored {
        None => {
            connection
                .execute(
                    "INSERT INTO akashi_meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION.to_string()],
                )
                .map_err(|err| map_sql_err(&err))?;
        }
        Some(value) => {
            let version: i64 = value.parse().map_err(|_| {
                SqliteStoreError::Corrupt(format!("schema_version is not numeric: {value}"))
            })?;
            if version > SCHEMA_VERSION {
                return Err(SqliteStoreError::VersionMismatch(format!(
                    "stored schema version {version} is newer than supported {SCHEMA_VERSION}"
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every decision SELECT.
const DECISION_COLUMNS: &str = "id, run_id, org_id, agent, decision_type, outcome, confidence, \
                                reasoning, metadata, embedding, quality_score, precedent_ref, \
                                valid_from, valid_to, transaction_time, content_hash";

/// Raw decision row before identifier and JSON parsing.
struct DecisionRow {
    /// Revision id text.
    id: String,
    /// Run id text.
    run_id: String,
    /// Organization id.
    org_id: String,
    /// Agent name.
    agent: String,
    /// Decision type label.
    decision_type: String,
    /// Outcome label.
    outcome: String,
    /// Confidence value.
    confidence: f64,
    /// Optional reasoning.
    reasoning: Option<String>,
    /// Metadata JSON text.
    metadata: String,
    /// Embedding JSON text.
    embedding: Option<String>,
    /// Quality score.
    quality_score: f64,
    /// Optional precedent id text.
    precedent_ref: Option<String>,
    /// Valid-from micros.
    valid_from: i64,
    /// Valid-to micros.
    valid_to: Option<i64>,
    /// Transaction-time micros.
    transaction_time: i64,
    /// Content hash.
    content_hash: String,
}

impl DecisionRow {
    /// Maps one result row.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            run_id: row.get(1)?,
            org_id: row.get(2)?,
            agent: row.get(3)?,
            decision_type: row.get(4)?,
            outcome: row.get(5)?,
            confidence: row.get(6)?,
            reasoning: row.get(7)?,
            metadata: row.get(8)?,
            embedding: row.get(9)?,
            quality_score: row.get(10)?,
            precedent_ref: row.get(11)?,
            valid_from: row.get(12)?,
            valid_to: row.get(13)?,
            transaction_time: row.get(14)?,
            content_hash: row.get(15)?,
        })
    }

    /// Converts the raw row into a domain decision.
    fn into_decision(self) -> Result<Decision, StoreError> {
        Ok(Decision {
            id: DecisionId::from_uuid(parse_uuid(&self.id)?),
            run_id: RunId::from_uuid(parse_uuid(&self.run_id)?),
            org_id: OrgId::new(self.org_id),
            agent: AgentName::new(self.agent),
            decision_type: self.decision_type,
            outcome: self.outcome,
            confidence: self.confidence,
            reasoning: self.reasoning,
            metadata: parse_json(self.metadata.as_str())?,
            embedding: self
                .embedding
                .as_deref()
                .map(|raw| {
                    serde_json::from_str::<Vec<f32>>(raw).map_err(|err| {
                        StoreError::Corrupt(format!("embedding column: {err}"))
                    })
                })
                .transpose()?,
            quality_score: self.quality_score,
            precedent_ref: self
                .precedent_ref
                .as_deref()
                .map(|raw| parse_uuid(raw).map(DecisionId::from_uuid))
                .transpose()?,
            valid_from: Timestamp::from_unix_micros(self.valid_from),
            valid_to: self.valid_to.map(Timestamp::from_unix_micros),
            transaction_time: Timestamp::from_unix_micros(self.transaction_time),
            content_hash: self.content_hash,
        })
    }
}

/// Parses a UUID column.
fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::Corrupt(format!("invalid uuid: {raw}")))
}

/// Parses a JSON column.
fn parse_json(raw: &str) -> Result<serde_json::Value, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Corrupt(format!("json column: {err}")))
}

/// Serializes a JSON column.
fn to_json_text(value: &serde_json::Value) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::Invalid(format!("json column: {err}")))
}

/// Parses a role column.
fn parse_role(raw: &str) -> Result<AgentRole, StoreError> {
    match raw {
        "admin" => Ok(AgentRole::Admin),
        "agent" => Ok(AgentRole::Agent),
        "reader" => Ok(AgentRole::Reader),
        other => Err(StoreError::Corrupt(format!("invalid role: {other}"))),
    }
}

/// Parses a plan column.
fn parse_plan(raw: &str) -> Result<Plan, StoreError> {
    match raw {
        "free" => Ok(Plan::Free),
        "pro" => Ok(Plan::Pro),
        "enterprise" => Ok(Plan::Enterprise),
        other => Err(StoreError::Corrupt(format!("invalid plan: {other}"))),
    }
}

/// Parses a run status column.
fn parse_run_status(raw: &str) -> Result<RunStatus, StoreError> {
    match raw {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        other => Err(StoreError::Corrupt(format!("invalid run status: {other}"))),
    }
}

/// Parses an outbox operation column.
fn parse_operation(raw: &str) -> Result<OutboxOperation, StoreError> {
    match raw {
        "upsert" => Ok(OutboxOperation::Upsert),
        "delete" => Ok(OutboxOperation::Delete),
        other => Err(StoreError::Corrupt(format!("invalid outbox operation: {other}"))),
    }
}

/// Parses an idempotency state column.
fn parse_idempotency_state(raw: &str) -> Result<IdempotencyState, StoreError> {
    match raw {
        "in_progress" => Ok(IdempotencyState::InProgress),
        "completed" => Ok(IdempotencyState::Completed),
        "abandoned" => Ok(IdempotencyState::Abandoned),
        other => Err(StoreError::Corrupt(format!("invalid idempotency state: {other}"))),
    }
}

// ============================================================================
// SECTION: Trace Store
// ============================================================================

impl TraceStore for SqliteStore {
    fn create_trace(&self, write: &TraceWrite) -> Result<TraceOutcome, StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;

        if write.quota_limit > 0 {
            let count: u64 = tx
                .query_row(
                    "SELECT decision_count FROM usage_counters
                     WHERE org_id = ?1 AND period = ?2",
                    params![write.org_id.as_str(), write.period],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(store_err)?
                .unwrap_or(0)
                .try_into()
                .map_err(|_| StoreError::Corrupt("negative decision_count".to_string()))?;
            if count >= write.quota_limit {
                return Err(StoreError::QuotaExceeded {
                    limit: write.quota_limit,
                    count,
                });
            }
        }

        if let Some(run) = &write.create_run {
            insert_run_tx(&tx, run)?;
        } else {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM agent_runs WHERE id = ?1 AND org_id = ?2",
                    params![
                        write.decision.run_id.as_uuid().to_string(),
                        write.org_id.as_str()
                    ],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err)?;
            if exists.is_none() {
                return Err(StoreError::NotFound(format!("run {}", write.decision.run_id)));
            }
        }

        // Close the predecessor unconditionally so the partial unique index
        // never sees two current revisions for one logical key.
        let superseded: Option<String> = tx
            .query_row(
                "SELECT id FROM decisions
                 WHERE org_id = ?1 AND agent = ?2 AND decision_type = ?3
                   AND valid_to IS NULL",
                params![
                    write.org_id.as_str(),
                    write.decision.agent.as_str(),
                    write.decision.decision_type
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if let Some(predecessor) = &superseded {
            tx.execute(
                "UPDATE decisions SET valid_to = ?1 WHERE id = ?2",
                params![write.decision.valid_from.unix_micros(), predecessor],
            )
            .map_err(store_err)?;
        }

        insert_decision_tx(&tx, &write.decision)?;
        for alternative in &write.alternatives {
            insert_alternative_tx(&tx, alternative)?;
        }
        for evidence in &write.evidence {
            insert_evidence_tx(&tx, evidence)?;
        }

        tx.execute(
            "INSERT INTO search_outbox (decision_id, org_id, operation, attempts, created_at)
             VALUES (?1, ?2, 'upsert', 0, ?3)",
            params![
                write.decision.id.as_uuid().to_string(),
                write.org_id.as_str(),
                write.now.unix_micros()
            ],
        )
        .map_err(store_err)?;

        tx.execute(
            "INSERT INTO usage_counters (org_id, period, decision_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT (org_id, period)
             DO UPDATE SET decision_count = decision_count + 1",
            params![write.org_id.as_str(), write.period],
        )
        .map_err(store_err)?;

        if let Some((key, snapshot)) = &write.idempotency {
            let snapshot_text = to_json_text(snapshot)?;
            tx.execute(
                "INSERT INTO idempotency_keys
                     (org_id, key, state, response_snapshot, created_at, completed_at,
                      expires_at)
                 VALUES (?1, ?2, 'completed', ?3, ?4, ?4, ?5)
                 ON CONFLICT (org_id, key)
                 DO UPDATE SET state = 'completed', response_snapshot = ?3,
                               completed_at = ?4, expires_at = ?5",
                params![
                    write.org_id.as_str(),
                    key.as_str(),
                    snapshot_text,
                    write.now.unix_micros(),
                    write
                        .now
                        .plus_seconds(IdempotencyState::Completed.ttl_seconds())
                        .unix_micros()
                ],
            )
            .map_err(store_err)?;
        }

        tx.commit().map_err(store_err)?;
        Ok(TraceOutcome {
            decision_id: write.decision.id,
            run_id: write.decision.run_id,
            superseded: superseded
                .as_deref()
                .map(|raw| parse_uuid(raw).map(DecisionId::from_uuid))
                .transpose()?,
        })
    }
}

/// Inserts a run row inside an open transaction.
fn insert_run_tx(tx: &rusqlite::Transaction<'_>, run: &AgentRun) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO agent_runs
             (id, org_id, agent, status, parent_run_id, trace_id, started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.id.as_uuid().to_string(),
            run.org_id.as_str(),
            run.agent.as_str(),
            run.status.as_str(),
            run.parent_run_id.map(|id| id.as_uuid().to_string()),
            run.trace_id,
            run.started_at.unix_micros(),
            run.completed_at.map(|instant| instant.unix_micros())
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// Inserts a decision row inside an open transaction.
fn insert_decision_tx(
    tx: &rusqlite::Transaction<'_>,
    decision: &Decision,
) -> Result<(), StoreError> {
    let embedding = decision
        .embedding
        .as_ref()
        .map(|vector| {
            serde_json::to_string(vector)
                .map_err(|err| StoreError::Invalid(format!("embedding column: {err}")))
        })
        .transpose()?;
    tx.execute(
        "INSERT INTO decisions
             (id, run_id, org_id, agent, decision_type, outcome, confidence, reasoning,
              metadata, embedding, quality_score, precedent_ref, valid_from, valid_to,
              transaction_time, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            decision.id.as_uuid().to_string(),
            decision.run_id.as_uuid().to_string(),
            decision.org_id.as_str(),
            decision.agent.as_str(),
            decision.decision_type,
            decision.outcome,
            decision.confidence,
            decision.reasoning,
            to_json_text(&decision.metadata)?,
            embedding,
            decision.quality_score,
            decision.precedent_ref.map(|id| id.as_uuid().to_string()),
            decision.valid_from.unix_micros(),
            decision.valid_to.map(|instant| instant.unix_micros()),
            decision.transaction_time.unix_micros(),
            decision.content_hash
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// Inserts an alternative row inside an open transaction.
fn insert_alternative_tx(
    tx: &rusqlite::Transaction<'_>,
    alternative: &Alternative,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO alternatives
             (id, decision_id, label, score, selected, rejection_reason, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            alternative.id.to_string(),
            alternative.decision_id.as_uuid().to_string(),
            alternative.label,
            alternative.score,
            i64::from(alternative.selected),
            alternative.rejection_reason,
            to_json_text(&alternative.metadata)?
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// Inserts an evidence row inside an open transaction.
fn insert_evidence_tx(
    tx: &rusqlite::Transaction<'_>,
    evidence: &Evidence,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO evidence
             (id, decision_id, source_type, source_uri, content, relevance_score, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            evidence.id.to_string(),
            evidence.decision_id.as_uuid().to_string(),
            evidence.source_type,
            evidence.source_uri,
            evidence.content,
            evidence.relevance_score,
            to_json_text(&evidence.metadata)?
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

impl DecisionStore for SqliteStore {
    fn current_decision(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
    ) -> Result<Option<Decision>, StoreError> {
        let guard = self.reader();
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE org_id = ?1 AND agent = ?2 AND decision_type = ?3
               AND valid_to IS NULL"
        );
        let row = guard
            .query_row(
                &sql,
                params![org_id.as_str(), agent.as_str(), decision_type],
                DecisionRow::from_row,
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        row.map(DecisionRow::into_decision).transpose()
    }

    fn get_decision(
        &self,
        org_id: &OrgId,
        id: DecisionId,
    ) -> Result<Option<Decision>, StoreError> {
        let guard = self.reader();
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE id = ?1 AND org_id = ?2"
        );
        let row = guard
            .query_row(
                &sql,
                params![id.as_uuid().to_string(), org_id.as_str()],
                DecisionRow::from_row,
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        row.map(DecisionRow::into_decision).transpose()
    }

    fn current_decisions_with_embeddings(
        &self,
        ids: &[DecisionId],
    ) -> Result<Vec<Decision>, StoreError> {
        let mut decisions = Vec::new();
        let guard = self.reader();
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE id = ?1 AND valid_to IS NULL AND embedding IS NOT NULL"
        );
        let mut stmt = guard.prepare(&sql).map_err(store_err)?;
        for id in ids {
            let row = stmt
                .query_row(params![id.as_uuid().to_string()], DecisionRow::from_row)
                .optional()
                .map_err(store_err)?;
            if let Some(row) = row {
                decisions.push(row.into_decision()?);
            }
        }
        drop(stmt);
        drop(guard);
        Ok(decisions)
    }

    fn list_current(
        &self,
        org_id: &OrgId,
        decision_type: &str,
        agent: Option<&AgentName>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let guard = self.reader();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE org_id = ?1 AND decision_type = ?2 AND valid_to IS NULL
               AND (?3 IS NULL OR agent = ?3)
             ORDER BY transaction_time DESC
             LIMIT ?4"
        );
        let mut stmt = guard.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(
                params![
                    org_id.as_str(),
                    decision_type,
                    agent.map(AgentName::as_str),
                    limit
                ],
                DecisionRow::from_row,
            )
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter().map(DecisionRow::into_decision).collect()
    }

    fn decisions_as_of(
        &self,
        org_id: &OrgId,
        instant: Timestamp,
        decision_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let guard = self.reader();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE org_id = ?1 AND valid_from <= ?2
               AND (valid_to IS NULL OR ?2 < valid_to)
               AND (?3 IS NULL OR decision_type = ?3)
             ORDER BY valid_from DESC
             LIMIT ?4"
        );
        let mut stmt = guard.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(
                params![org_id.as_str(), instant.unix_micros(), decision_type, limit],
                DecisionRow::from_row,
            )
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter().map(DecisionRow::into_decision).collect()
    }

    fn recent_decisions(
        &self,
        org_id: &OrgId,
        limit: usize,
    ) -> Result<Vec<Decision>, StoreError> {
        let guard = self.reader();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE org_id = ?1 AND valid_to IS NULL
             ORDER BY transaction_time DESC
             LIMIT ?2"
        );
        let mut stmt = guard.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params![org_id.as_str(), limit], DecisionRow::from_row)
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter().map(DecisionRow::into_decision).collect()
    }

    fn alternatives_for(&self, decision_id: DecisionId) -> Result<Vec<Alternative>, StoreError> {
        let guard = self.reader();
        let mut stmt = guard
            .prepare(
                "SELECT id, label, score, selected, rejection_reason, metadata
                 FROM alternatives WHERE decision_id = ?1 ORDER BY id",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![decision_id.as_uuid().to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter()
            .map(|(id, label, score, selected, rejection_reason, metadata)| {
                Ok(Alternative {
                    id: parse_uuid(&id)?,
                    decision_id,
                    label,
                    score,
                    selected: selected != 0,
                    rejection_reason,
                    metadata: parse_json(&metadata)?,
                })
            })
            .collect()
    }

    fn evidence_for(&self, decision_id: DecisionId) -> Result<Vec<Evidence>, StoreError> {
        let guard = self.reader();
        let mut stmt = guard
            .prepare(
                "SELECT id, source_type, source_uri, content, relevance_score, metadata
                 FROM evidence WHERE decision_id = ?1 ORDER BY id",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![decision_id.as_uuid().to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter()
            .map(|(id, source_type, source_uri, content, relevance_score, metadata)| {
                Ok(Evidence {
                    id: parse_uuid(&id)?,
                    decision_id,
                    source_type,
                    source_uri,
                    content,
                    relevance_score,
                    metadata: parse_json(&metadata)?,
                })
            })
            .collect()
    }

    fn supersede(
        &self,
        org_id: &OrgId,
        agent: &AgentName,
        decision_type: &str,
        new_valid_from: Timestamp,
    ) -> Result<Option<DecisionId>, StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let current: Option<String> = tx
            .query_row(
                "SELECT id FROM decisions
                 WHERE org_id = ?1 AND agent = ?2 AND decision_type = ?3
                   AND valid_to IS NULL",
                params![org_id.as_str(), agent.as_str(), decision_type],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if let Some(id) = &current {
            tx.execute(
                "UPDATE decisions SET valid_to = ?1 WHERE id = ?2",
                params![new_valid_from.unix_micros(), id],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        current.as_deref().map(|raw| parse_uuid(raw).map(DecisionId::from_uuid)).transpose()
    }

    fn delete_decision(
        &self,
        org_id: &OrgId,
        id: DecisionId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let removed = tx
            .execute(
                "DELETE FROM decisions WHERE id = ?1 AND org_id = ?2",
                params![id.as_uuid().to_string(), org_id.as_str()],
            )
            .map_err(store_err)?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("decision {id}")));
        }
        tx.execute(
            "INSERT INTO search_outbox (decision_id, org_id, operation, attempts, created_at)
             VALUES (?1, ?2, 'delete', 0, ?3)",
            params![id.as_uuid().to_string(), org_id.as_str(), now.unix_micros()],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn refresh_conflicts(&self, now: Timestamp) -> Result<(), StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        tx.execute("DELETE FROM current_decisions", []).map_err(store_err)?;
        tx.execute(
            "INSERT INTO current_decisions
                 (org_id, agent, decision_type, decision_id, outcome,
                  prior_decision_id, prior_outcome, refreshed_at)
             SELECT d.org_id, d.agent, d.decision_type, d.id, d.outcome,
                 (SELECT p.id FROM decisions p
                  WHERE p.org_id = d.org_id AND p.agent = d.agent
                    AND p.decision_type = d.decision_type AND p.valid_to IS NOT NULL
                  ORDER BY p.valid_to DESC LIMIT 1),
                 (SELECT p.outcome FROM decisions p
                  WHERE p.org_id = d.org_id AND p.agent = d.agent
                    AND p.decision_type = d.decision_type AND p.valid_to IS NOT NULL
                  ORDER BY p.valid_to DESC LIMIT 1),
                 ?1
             FROM decisions d
             WHERE d.valid_to IS NULL",
            params![now.unix_micros()],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn count_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
    ) -> Result<u64, StoreError> {
        let conflicts = self.query_conflicts(org_id, filter)?;
        Ok(u64::try_from(conflicts.len()).unwrap_or(u64::MAX))
    }

    fn list_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
        limit: usize,
        offset: usize,
    ) -> Result<ConflictPage, StoreError> {
        let conflicts = self.query_conflicts(org_id, filter)?;
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
        let guard = self.reader();
        let stats = guard
            .query_row(
                "SELECT COUNT(*), COALESCE(AVG(confidence), 0.0),
                        COALESCE(AVG(quality_score), 0.0)
                 FROM decisions WHERE org_id = ?1 AND valid_to IS NULL",
                params![org_id.as_str()],
                |row| {
                    Ok(DecisionQualityStats {
                        total_decisions: row.get::<_, i64>(0)?.try_into().unwrap_or(0),
                        average_confidence: row.get(1)?,
                        average_quality: row.get(2)?,
                    })
                },
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(stats)
    }

    fn evidence_coverage_stats(
        &self,
        org_id: &OrgId,
    ) -> Result<EvidenceCoverageStats, StoreError> {
        let guard = self.reader();
        // The join fans out one row per evidence record; both counts must
        // stay per-decision.
        let (total, with_evidence): (i64, i64) = guard
            .query_row(
                "SELECT COUNT(DISTINCT d.id),
                        COUNT(DISTINCT CASE WHEN e.decision_id IS NOT NULL
                                            THEN d.id END)
                 FROM decisions d
                 LEFT JOIN evidence e ON e.decision_id = d.id
                 WHERE d.org_id = ?1 AND d.valid_to IS NULL",
                params![org_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(store_err)?;
        drop(guard);
        let total = u64::try_from(total).unwrap_or(0);
        let with_evidence = u64::try_from(with_evidence).unwrap_or(0);
        let coverage = if total == 0 {
            0.0
        } else {
            with_evidence as f64 / total as f64
        };
        Ok(EvidenceCoverageStats {
            total_decisions: total,
            with_evidence,
            coverage,
        })
    }
}

impl SqliteStore {
    /// Derives conflicts from the refreshed projection.
    fn query_conflicts(
        &self,
        org_id: &OrgId,
        filter: &ConflictFilter,
    ) -> Result<Vec<Conflict>, StoreError> {
        let guard = self.reader();
        let mut stmt = guard
            .prepare(
                "SELECT a.decision_type, 'cross_agent',
                        a.decision_id, a.agent, a.outcome,
                        b.decision_id, b.agent, b.outcome, a.refreshed_at
                 FROM current_decisions a
                 JOIN current_decisions b
                   ON a.org_id = b.org_id
                  AND a.decision_type = b.decision_type
                  AND a.decision_id < b.decision_id
                 WHERE a.org_id = ?1 AND a.agent <> b.agent AND a.outcome <> b.outcome
                 UNION ALL
                 SELECT decision_type, 'self_contradiction',
                        decision_id, agent, outcome,
                        prior_decision_id, agent, prior_outcome, refreshed_at
                 FROM current_decisions
                 WHERE org_id = ?1 AND prior_outcome IS NOT NULL
                   AND prior_outcome <> outcome",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![org_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, i64>(8)?,
                ))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        let mut conflicts = Vec::with_capacity(rows.len());
        for (dtype, kind, id_a, agent_a, outcome_a, id_b, agent_b, outcome_b, refreshed) in rows
        {
            let kind = match kind.as_str() {
                "cross_agent" => ConflictKind::CrossAgent,
                _ => ConflictKind::SelfContradiction,
            };
            conflicts.push(Conflict {
                org_id: org_id.clone(),
                decision_type: dtype,
                kind,
                decision_a: DecisionId::from_uuid(parse_uuid(&id_a)?),
                agent_a: AgentName::new(agent_a),
                outcome_a,
                decision_b: DecisionId::from_uuid(parse_uuid(&id_b)?),
                agent_b: AgentName::new(agent_b),
                outcome_b,
                detected_at: Timestamp::from_unix_micros(refreshed),
            });
        }
        conflicts.retain(|conflict| {
            filter
                .decision_type
                .as_ref()
                .is_none_or(|wanted| &conflict.decision_type == wanted)
                && filter.kind.is_none_or(|wanted| conflict.kind == wanted)
                && filter.agent.as_ref().is_none_or(|wanted| {
                    &conflict.agent_a == wanted || &conflict.agent_b == wanted
                })
        });
        conflicts.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| a.decision_a.cmp(&b.decision_a))
                .then_with(|| a.decision_b.cmp(&b.decision_b))
        });
        Ok(conflicts)
    }
}

// ============================================================================
// SECTION: Outbox Store
// ============================================================================

/// Column list shared by outbox SELECTs.
const OUTBOX_COLUMNS: &str =
    "id, decision_id, org_id, operation, attempts, locked_until, last_error, created_at";

/// Maps one outbox result row.
fn outbox_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(
    i64,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
    i64,
)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Converts a raw outbox tuple into a domain entry.
fn build_outbox_entry(
    raw: (i64, String, String, String, i64, Option<i64>, Option<String>, i64),
) -> Result<OutboxEntry, StoreError> {
    let (id, decision_id, org_id, operation, attempts, locked_until, last_error, created_at) =
        raw;
    Ok(OutboxEntry {
        id,
        decision_id: DecisionId::from_uuid(parse_uuid(&decision_id)?),
        org_id: OrgId::new(org_id),
        operation: parse_operation(&operation)?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        locked_until: locked_until.map(Timestamp::from_unix_micros),
        last_error,
        created_at: Timestamp::from_unix_micros(created_at),
    })
}

impl OutboxStore for SqliteStore {
    fn enqueue_outbox(
        &self,
        decision_id: DecisionId,
        org_id: &OrgId,
        operation: OutboxOperation,
        now: Timestamp,
    ) -> Result<i64, StoreError> {
        let guard = self.writer();
        guard
            .execute(
                "INSERT INTO search_outbox
                     (decision_id, org_id, operation, attempts, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![
                    decision_id.as_uuid().to_string(),
                    org_id.as_str(),
                    operation.as_str(),
                    now.unix_micros()
                ],
            )
            .map_err(store_err)?;
        Ok(guard.last_insert_rowid())
    }

    fn claim_outbox_batch(
        &self,
        batch_size: usize,
        now: Timestamp,
        locked_until: Timestamp,
        max_attempts: u32,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let batch_size = i64::try_from(batch_size).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM search_outbox
             WHERE attempts < ?1 AND (locked_until IS NULL OR locked_until < ?2)
             ORDER BY created_at ASC, id ASC
             LIMIT ?3"
        );
        let raw_rows = {
            let mut stmt = tx.prepare(&sql).map_err(store_err)?;
            stmt.query_map(
                params![i64::from(max_attempts), now.unix_micros(), batch_size],
                outbox_entry_from_row,
            )
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?
        };
        let mut claimed = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let mut entry = build_outbox_entry(raw)?;
            tx.execute(
                "UPDATE search_outbox SET locked_until = ?1 WHERE id = ?2",
                params![locked_until.unix_micros(), entry.id],
            )
            .map_err(store_err)?;
            entry.locked_until = Some(locked_until);
            claimed.push(entry);
        }
        // The lock commit lands before any network I/O so a crashed worker's
        // claim expires on its own.
        tx.commit().map_err(store_err)?;
        Ok(claimed)
    }

    fn ack_outbox(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        for id in ids {
            tx.execute("DELETE FROM search_outbox WHERE id = ?1", params![id])
                .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn fail_outbox(&self, entries: &[(i64, Timestamp)], error: &str) -> Result<(), StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        for (id, retry_at) in entries {
            tx.execute(
                "UPDATE search_outbox
                 SET attempts = attempts + 1, last_error = ?1, locked_until = ?2
                 WHERE id = ?3",
                params![error, retry_at.unix_micros(), id],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn outbox_depth(&self, max_attempts: u32) -> Result<u64, StoreError> {
        let guard = self.reader();
        let depth: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM search_outbox WHERE attempts < ?1",
                params![i64::from(max_attempts)],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(u64::try_from(depth).unwrap_or(0))
    }

    fn dead_letter_count(&self, max_attempts: u32) -> Result<u64, StoreError> {
        let guard = self.reader();
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM search_outbox WHERE attempts >= ?1",
                params![i64::from(max_attempts)],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn sweep_dead_letters(
        &self,
        cutoff: Timestamp,
        max_attempts: u32,
    ) -> Result<u64, StoreError> {
        let guard = self.writer();
        let removed = guard
            .execute(
                "DELETE FROM search_outbox WHERE attempts >= ?1 AND created_at < ?2",
                params![i64::from(max_attempts), cutoff.unix_micros()],
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

impl UsageStore for SqliteStore {
    fn usage(&self, org_id: &OrgId, period: &str) -> Result<u64, StoreError> {
        let guard = self.reader();
        let count: Option<i64> = guard
            .query_row(
                "SELECT decision_count FROM usage_counters
                 WHERE org_id = ?1 AND period = ?2",
                params![org_id.as_str(), period],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        Ok(count.and_then(|value| u64::try_from(value).ok()).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Idempotency Store
// ============================================================================

impl IdempotencyStore for SqliteStore {
    fn begin_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<IdempotencyBegin, StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let existing: Option<(String, Option<String>, i64)> = tx
            .query_row(
                "SELECT state, response_snapshot, expires_at FROM idempotency_keys
                 WHERE org_id = ?1 AND key = ?2",
                params![org_id.as_str(), key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(store_err)?;
        if let Some((state, snapshot, expires_at)) = existing {
            let state = parse_idempotency_state(&state)?;
            let expired = Timestamp::from_unix_micros(expires_at) <= now;
            match state {
                IdempotencyState::Completed if !expired => {
                    let snapshot = snapshot
                        .as_deref()
                        .map(parse_json)
                        .transpose()?
                        .unwrap_or(serde_json::Value::Null);
                    return Ok(IdempotencyBegin::Replayed(snapshot));
                }
                IdempotencyState::InProgress if !expired => {
                    return Ok(IdempotencyBegin::InFlight);
                }
                _ => {}
            }
        }
        tx.execute(
            "INSERT INTO idempotency_keys
                 (org_id, key, state, response_snapshot, created_at, completed_at, expires_at)
             VALUES (?1, ?2, 'in_progress', NULL, ?3, NULL, ?4)
             ON CONFLICT (org_id, key)
             DO UPDATE SET state = 'in_progress', response_snapshot = NULL,
                           created_at = ?3, completed_at = NULL, expires_at = ?4",
            params![
                org_id.as_str(),
                key.as_str(),
                now.unix_micros(),
                now.plus_seconds(IdempotencyState::InProgress.ttl_seconds()).unix_micros()
            ],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(IdempotencyBegin::Started)
    }

    fn abandon_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let guard = self.writer();
        let changed = guard
            .execute(
                "UPDATE idempotency_keys SET state = 'abandoned', expires_at = ?1
                 WHERE org_id = ?2 AND key = ?3",
                params![
                    now.plus_seconds(IdempotencyState::Abandoned.ttl_seconds()).unix_micros(),
                    org_id.as_str(),
                    key.as_str()
                ],
            )
            .map_err(store_err)?;
        drop(guard);
        if changed == 0 {
            return Err(StoreError::NotFound(format!("idempotency key {key}")));
        }
        Ok(())
    }

    fn get_idempotent(
        &self,
        org_id: &OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let guard = self.reader();
        let row: Option<(String, Option<String>, i64, Option<i64>, i64)> = guard
            .query_row(
                "SELECT state, response_snapshot, created_at, completed_at, expires_at
                 FROM idempotency_keys WHERE org_id = ?1 AND key = ?2",
                params![org_id.as_str(), key.as_str()],
                |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                },
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        let Some((state, snapshot, created_at, completed_at, expires_at)) = row else {
            return Ok(None);
        };
        Ok(Some(IdempotencyRecord {
            key: key.clone(),
            org_id: org_id.clone(),
            state: parse_idempotency_state(&state)?,
            response_snapshot: snapshot.as_deref().map(parse_json).transpose()?,
            created_at: Timestamp::from_unix_micros(created_at),
            completed_at: completed_at.map(Timestamp::from_unix_micros),
            expires_at: Timestamp::from_unix_micros(expires_at),
        }))
    }

    fn sweep_idempotency_keys(&self, now: Timestamp) -> Result<u64, StoreError> {
        let guard = self.writer();
        let removed = guard
            .execute(
                "DELETE FROM idempotency_keys WHERE expires_at <= ?1",
                params![now.unix_micros()],
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

impl EventStore for SqliteStore {
    fn insert_events(&self, events: &[AgentEvent]) -> Result<u64, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        let mut inserted = 0_u64;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO agent_events
                         (run_id, sequence_num, org_id, agent, event_type, occurred_at,
                          payload)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(store_err)?;
            for event in events {
                let sequence = i64::try_from(event.sequence_num)
                    .map_err(|_| StoreError::Invalid("sequence_num out of range".into()))?;
                let changed = stmt
                    .execute(params![
                        event.run_id.as_uuid().to_string(),
                        sequence,
                        event.org_id.as_str(),
                        event.agent.as_str(),
                        event.event_type,
                        event.occurred_at.unix_micros(),
                        to_json_text(&event.payload)?
                    ])
                    .map_err(store_err)?;
                inserted += u64::try_from(changed).unwrap_or(0);
            }
        }
        tx.commit().map_err(store_err)?;
        Ok(inserted)
    }

    fn events_for_run(
        &self,
        run_id: RunId,
        limit: usize,
    ) -> Result<Vec<AgentEvent>, StoreError> {
        let guard = self.reader();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = guard
            .prepare(
                "SELECT run_id, sequence_num, org_id, agent, event_type, occurred_at, payload
                 FROM agent_events WHERE run_id = ?1
                 ORDER BY sequence_num ASC LIMIT ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![run_id.as_uuid().to_string(), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        rows.into_iter()
            .map(|(run, sequence, org, agent, event_type, occurred_at, payload)| {
                Ok(AgentEvent {
                    run_id: RunId::from_uuid(parse_uuid(&run)?),
                    org_id: OrgId::new(org),
                    event_type,
                    sequence_num: u64::try_from(sequence).unwrap_or(0),
                    occurred_at: Timestamp::from_unix_micros(occurred_at),
                    agent: AgentName::new(agent),
                    payload: parse_json(&payload)?,
                })
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

impl RunStore for SqliteStore {
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let mut guard = self.writer();
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;
        insert_run_tx(&tx, run)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn get_run(&self, org_id: &OrgId, run_id: RunId) -> Result<Option<AgentRun>, StoreError> {
        let guard = self.reader();
        let row: Option<(String, String, String, Option<String>, Option<String>, i64, Option<i64>)> =
            guard
                .query_row(
                    "SELECT agent, status, org_id, parent_run_id, trace_id, started_at,
                            completed_at
                     FROM agent_runs WHERE id = ?1 AND org_id = ?2",
                    params![run_id.as_uuid().to_string(), org_id.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(store_err)?;
        drop(guard);
        let Some((agent, status, org, parent_run_id, trace_id, started_at, completed_at)) = row
        else {
            return Ok(None);
        };
        Ok(Some(AgentRun {
            id: run_id,
            agent: AgentName::new(agent),
            org_id: OrgId::new(org),
            status: parse_run_status(&status)?,
            parent_run_id: parent_run_id
                .as_deref()
                .map(|raw| parse_uuid(raw).map(RunId::from_uuid))
                .transpose()?,
            trace_id,
            started_at: Timestamp::from_unix_micros(started_at),
            completed_at: completed_at.map(Timestamp::from_unix_micros),
        }))
    }

    fn complete_run(
        &self,
        org_id: &OrgId,
        run_id: RunId,
        status: RunStatus,
        completed_at: Timestamp,
    ) -> Result<(), StoreError> {
        let guard = self.writer();
        let changed = guard
            .execute(
                "UPDATE agent_runs SET status = ?1, completed_at = ?2
                 WHERE id = ?3 AND org_id = ?4",
                params![
                    status.as_str(),
                    completed_at.unix_micros(),
                    run_id.as_uuid().to_string(),
                    org_id.as_str()
                ],
            )
            .map_err(store_err)?;
        drop(guard);
        if changed == 0 {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Agent Store
// ============================================================================

impl AgentStore for SqliteStore {
    fn put_org(&self, org: &Organization) -> Result<(), StoreError> {
        let guard = self.writer();
        guard
            .execute(
                "INSERT INTO organizations
                     (id, plan, decision_limit, agent_limit, stripe_customer_id,
                      stripe_subscription_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (id)
                 DO UPDATE SET plan = ?2, decision_limit = ?3, agent_limit = ?4,
                               stripe_customer_id = ?5, stripe_subscription_id = ?6",
                params![
                    org.id.as_str(),
                    org.plan.as_str(),
                    i64::try_from(org.decision_limit).unwrap_or(i64::MAX),
                    i64::try_from(org.agent_limit).unwrap_or(i64::MAX),
                    org.stripe_customer_id,
                    org.stripe_subscription_id,
                    org.created_at.unix_micros()
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn get_org(&self, org_id: &OrgId) -> Result<Option<Organization>, StoreError> {
        let guard = self.reader();
        let row: Option<(String, i64, i64, Option<String>, Option<String>, i64)> = guard
            .query_row(
                "SELECT plan, decision_limit, agent_limit, stripe_customer_id,
                        stripe_subscription_id, created_at
                 FROM organizations WHERE id = ?1",
                params![org_id.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        let Some((plan, decision_limit, agent_limit, customer, subscription, created_at)) = row
        else {
            return Ok(None);
        };
        Ok(Some(Organization {
            id: org_id.clone(),
            plan: parse_plan(&plan)?,
            decision_limit: u64::try_from(decision_limit).unwrap_or(0),
            agent_limit: u64::try_from(agent_limit).unwrap_or(0),
            stripe_customer_id: customer,
            stripe_subscription_id: subscription,
            created_at: Timestamp::from_unix_micros(created_at),
        }))
    }

    fn put_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let guard = self.writer();
        guard
            .execute(
                "INSERT INTO agents
                     (id, org_id, name, role, api_key_hash, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (org_id, name)
                 DO UPDATE SET role = ?4, api_key_hash = ?5, metadata = ?6",
                params![
                    agent.id.as_uuid().to_string(),
                    agent.org_id.as_str(),
                    agent.name.as_str(),
                    agent.role.as_str(),
                    agent.api_key_hash,
                    to_json_text(&agent.metadata)?,
                    agent.created_at.unix_micros()
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn get_agent(
        &self,
        org_id: &OrgId,
        name: &AgentName,
    ) -> Result<Option<Agent>, StoreError> {
        let guard = self.reader();
        let row: Option<(String, String, String, String, i64)> = guard
            .query_row(
                "SELECT id, role, api_key_hash, metadata, created_at
                 FROM agents WHERE org_id = ?1 AND name = ?2",
                params![org_id.as_str(), name.as_str()],
                |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                },
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        let Some((id, role, api_key_hash, metadata, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Agent {
            id: AgentId::from_uuid(parse_uuid(&id)?),
            name: name.clone(),
            org_id: org_id.clone(),
            role: parse_role(&role)?,
            api_key_hash,
            metadata: parse_json(&metadata)?,
            created_at: Timestamp::from_unix_micros(created_at),
        }))
    }

    fn count_agents(&self, org_id: &OrgId) -> Result<u64, StoreError> {
        let guard = self.reader();
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM agents WHERE org_id = ?1",
                params![org_id.as_str()],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        drop(guard);
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Proof Store
// ============================================================================

impl ProofStore for SqliteStore {
    fn content_hashes_in_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<String>, StoreError> {
        let guard = self.reader();
        let mut stmt = guard
            .prepare(
                "SELECT content_hash FROM decisions
                 WHERE transaction_time >= ?1 AND transaction_time < ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![start.unix_micros(), end.unix_micros()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        drop(stmt);
        drop(guard);
        Ok(rows)
    }

    fn put_proof(&self, proof: &IntegrityProof) -> Result<(), StoreError> {
        let guard = self.writer();
        guard
            .execute(
                "INSERT INTO integrity_proofs
                     (batch_id, root_hash, leaf_count, range_start, range_end, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    proof.batch_id.as_uuid().to_string(),
                    proof.root_hash,
                    i64::try_from(proof.leaf_count).unwrap_or(i64::MAX),
                    proof.range_start.unix_micros(),
                    proof.range_end.unix_micros(),
                    proof.created_at.unix_micros()
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn latest_proof(&self) -> Result<Option<IntegrityProof>, StoreError> {
        let guard = self.reader();
        let row: Option<(String, String, i64, i64, i64, i64)> = guard
            .query_row(
                "SELECT batch_id, root_hash, leaf_count, range_start, range_end, created_at
                 FROM integrity_proofs ORDER BY created_at DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;
        drop(guard);
        let Some((batch_id, root_hash, leaf_count, range_start, range_end, created_at)) = row
        else {
            return Ok(None);
        };
        Ok(Some(IntegrityProof {
            batch_id: BatchId::from_uuid(parse_uuid(&batch_id)?),
            root_hash,
            leaf_count: u64::try_from(leaf_count).unwrap_or(0),
            range_start: Timestamp::from_unix_micros(range_start),
            range_end: Timestamp::from_unix_micros(range_end),
            created_at: Timestamp::from_unix_micros(created_at),
        }))
    }
}

// ============================================================================
// SECTION: Health
// ============================================================================

impl StoreHealth for SqliteStore {
    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.reader();
        let _: i64 = guard
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(())
    }
}
