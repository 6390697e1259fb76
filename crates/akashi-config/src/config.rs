// crates/akashi-config/src/config.rs
// ============================================================================
// Module: Akashi Configuration
// Description: Configuration loading and validation for the decision plane.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: akashi-core, akashi-index, akashi-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits. Missing
//! or invalid configuration fails closed: the service refuses to start
//! rather than running with defaults it cannot justify. Every section maps
//! onto the typed config of the component it drives.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use akashi_core::EventBufferConfig;
use akashi_core::OutboxConfig;
use akashi_index::HttpIndexConfig;
use akashi_store_sqlite::SqliteStoreConfig;
use akashi_store_sqlite::SqliteStoreMode;
use akashi_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "akashi.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "AKASHI_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Configuration file exceeded the size limit.
    #[error("config file too large: {actual} bytes (max {max})")]
    TooLarge {
        /// Maximum allowed bytes.
        max: usize,
        /// Actual file size in bytes.
        actual: usize,
    },
    /// Configuration failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Configuration failed validation.
    #[error("config validation error: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Relational store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// In-memory store; state dies with the process.
    Memory,
    /// `SQLite` WAL store.
    #[default]
    Sqlite,
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Backend selection.
    #[serde(default)]
    pub kind: StoreKind,
    /// Database file path; required for the `SQLite` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Read connection pool size.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Event buffer configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BufferSection {
    /// Maximum buffered events before drop-oldest engages.
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,
    /// Queue length that triggers an immediate flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Timer-driven flush period in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Maximum events per batch statement.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Transient-failure retries before a batch is dropped.
    #[serde(default = "default_max_flush_retries")]
    pub max_flush_retries: u32,
    /// Base retry backoff in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            flush_threshold: default_flush_threshold(),
            flush_interval_ms: default_flush_interval_ms(),
            max_batch_size: default_max_batch_size(),
            max_flush_retries: default_max_flush_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Search outbox worker configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OutboxSection {
    /// Poll ticker period in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum entries claimed per poll.
    #[serde(default = "default_outbox_batch_size")]
    pub batch_size: usize,
    /// Attempts before an entry is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Claim lease duration in seconds.
    #[serde(default = "default_lock_seconds")]
    pub lock_seconds: i64,
    /// Exponential backoff cap in seconds.
    #[serde(default = "default_backoff_cap_seconds")]
    pub backoff_cap_seconds: i64,
    /// Dead-letter sweep period in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Dead-letter retention in days.
    #[serde(default = "default_dead_letter_retention_days")]
    pub dead_letter_retention_days: i64,
}

impl Default for OutboxSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_outbox_batch_size(),
            max_attempts: default_max_attempts(),
            lock_seconds: default_lock_seconds(),
            backoff_cap_seconds: default_backoff_cap_seconds(),
            sweep_interval_secs: default_sweep_interval_secs(),
            dead_letter_retention_days: default_dead_letter_retention_days(),
        }
    }
}

/// Conflict detector configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConflictSection {
    /// Projection refresh period in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for ConflictSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndexSection {
    /// HTTP client settings for the points API.
    #[serde(flatten)]
    pub http: HttpIndexConfig,
}

/// Quota defaults applied to new organizations.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct QuotaSection {
    /// Default monthly decision limit; `0` means unlimited.
    #[serde(default)]
    pub default_decision_limit: u64,
    /// Default agent limit; `0` means unlimited.
    #[serde(default)]
    pub default_agent_limit: u64,
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Returns the default read pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Returns the default buffer capacity.
const fn default_buffer_capacity() -> usize {
    1_000
}

/// Returns the default flush threshold.
const fn default_flush_threshold() -> usize {
    100
}

/// Returns the default flush interval in milliseconds.
const fn default_flush_interval_ms() -> u64 {
    100
}

/// Returns the default event batch size.
const fn default_max_batch_size() -> usize {
    500
}

/// Returns the default flush retry bound.
const fn default_max_flush_retries() -> u32 {
    3
}

/// Returns the default flush retry backoff in milliseconds.
const fn default_retry_backoff_ms() -> u64 {
    50
}

/// Returns the default outbox poll interval in seconds.
const fn default_poll_interval_secs() -> u64 {
    5
}

/// Returns the default outbox batch size.
const fn default_outbox_batch_size() -> usize {
    50
}

/// Returns the default outbox attempt bound.
const fn default_max_attempts() -> u32 {
    10
}

/// Returns the default outbox lock window in seconds.
const fn default_lock_seconds() -> i64 {
    60
}

/// Returns the default backoff cap in seconds.
const fn default_backoff_cap_seconds() -> i64 {
    300
}

/// Returns the default dead-letter sweep period in seconds.
const fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

/// Returns the default dead-letter retention in days.
const fn default_dead_letter_retention_days() -> i64 {
    7
}

/// Returns the default conflict refresh interval in seconds.
const fn default_refresh_interval_secs() -> u64 {
    30
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the Akashi decision plane.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AkashiConfig {
    /// Relational store settings.
    #[serde(default)]
    pub store: StoreSection,
    /// Event buffer settings.
    #[serde(default)]
    pub buffer: BufferSection,
    /// Search outbox worker settings.
    #[serde(default)]
    pub outbox: OutboxSection,
    /// Conflict detector settings.
    #[serde(default)]
    pub conflicts: ConflictSection,
    /// Vector index settings.
    #[serde(default)]
    pub index: IndexSection,
    /// Quota defaults.
    #[serde(default)]
    pub quota: QuotaSection,
}

impl AkashiConfig {
    /// Loads configuration from the given path, the `AKASHI_CONFIG`
    /// environment variable, or the default filename, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, exceeds the
    /// size limit, fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => env::var_os(CONFIG_ENV_VAR)
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from),
        };
        let metadata =
            fs::metadata(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                max: MAX_CONFIG_FILE_SIZE,
                actual: size,
            });
        }
        let raw =
            fs::read_to_string(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants, failing closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.kind == StoreKind::Sqlite && self.store.path.is_none() {
            return Err(ConfigError::Invalid("sqlite store requires store.path".into()));
        }
        if self.store.read_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "store.read_pool_size must be greater than zero".into(),
            ));
        }
        if self.buffer.capacity == 0 {
            return Err(ConfigError::Invalid(
                "buffer.capacity must be greater than zero".into(),
            ));
        }
        if self.buffer.flush_threshold == 0 || self.buffer.flush_threshold > self.buffer.capacity
        {
            return Err(ConfigError::Invalid(
                "buffer.flush_threshold must be within 1..=buffer.capacity".into(),
            ));
        }
        if self.buffer.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer.max_batch_size must be greater than zero".into(),
            ));
        }
        if self.outbox.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "outbox.batch_size must be greater than zero".into(),
            ));
        }
        if self.outbox.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "outbox.max_attempts must be greater than zero".into(),
            ));
        }
        if self.outbox.lock_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "outbox.lock_seconds must be greater than zero".into(),
            ));
        }
        // The lock window must outlive the index call; otherwise a second
        // worker can claim entries whose first delivery is still in flight.
        let lock_ms = self.outbox.lock_seconds.saturating_mul(1_000);
        if lock_ms <= i64::try_from(self.index.http.timeout_ms).unwrap_or(i64::MAX) {
            return Err(ConfigError::Invalid(
                "outbox.lock_seconds must exceed index.timeout_ms".into(),
            ));
        }
        if self.outbox.backoff_cap_seconds <= 0 {
            return Err(ConfigError::Invalid(
                "outbox.backoff_cap_seconds must be greater than zero".into(),
            ));
        }
        if self.outbox.dead_letter_retention_days <= 0 {
            return Err(ConfigError::Invalid(
                "outbox.dead_letter_retention_days must be greater than zero".into(),
            ));
        }
        if self.conflicts.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "conflicts.refresh_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Returns the event buffer configuration.
    #[must_use]
    pub const fn buffer_config(&self) -> EventBufferConfig {
        EventBufferConfig {
            capacity: self.buffer.capacity,
            flush_threshold: self.buffer.flush_threshold,
            flush_interval: Duration::from_millis(self.buffer.flush_interval_ms),
            max_batch_size: self.buffer.max_batch_size,
            max_flush_retries: self.buffer.max_flush_retries,
            retry_backoff: Duration::from_millis(self.buffer.retry_backoff_ms),
        }
    }

    /// Returns the outbox worker configuration.
    #[must_use]
    pub const fn outbox_config(&self) -> OutboxConfig {
        OutboxConfig {
            poll_interval: Duration::from_secs(self.outbox.poll_interval_secs),
            batch_size: self.outbox.batch_size,
            max_attempts: self.outbox.max_attempts,
            lock_seconds: self.outbox.lock_seconds,
            backoff_cap_seconds: self.outbox.backoff_cap_seconds,
            sweep_interval: Duration::from_secs(self.outbox.sweep_interval_secs),
            dead_letter_retention_seconds: self.outbox.dead_letter_retention_days
                * 24
                * 60
                * 60,
        }
    }

    /// Returns the conflict refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.conflicts.refresh_interval_secs)
    }

    /// Returns the `SQLite` store configuration when that backend is
    /// selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store.kind != StoreKind::Sqlite {
            return None;
        }
        self.store.path.clone().map(|path| SqliteStoreConfig {
            path,
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
            read_pool_size: self.store.read_pool_size,
        })
    }

    /// Returns the HTTP index client configuration.
    #[must_use]
    pub fn index_config(&self) -> HttpIndexConfig {
        self.index.http.clone()
    }
}
