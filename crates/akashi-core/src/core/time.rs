// crates/akashi-core/src/core/time.rs
// ============================================================================
// Module: Akashi Time Model
// Description: Microsecond-precision UTC timestamps and the clock seam.
// Purpose: Provide bi-temporal instants that round-trip through storage.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Akashi timestamps are unix microseconds in UTC. Database timestamp columns
//! round-trip at microsecond resolution, so every instant is truncated to
//! microseconds before it is hashed or persisted. Components never read the
//! wall clock directly; they hold a [`Clock`] so tests can inject their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Microsecond-precision UTC instant.
///
/// # Invariants
/// - The stored value is whole unix microseconds; sub-microsecond precision
///   is discarded at construction.
/// - Serializes as an RFC 3339 string with exactly six fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix microseconds.
    #[must_use]
    pub const fn from_unix_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the timestamp as unix microseconds.
    #[must_use]
    pub const fn unix_micros(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp advanced by the given number of microseconds.
    #[must_use]
    pub const fn plus_micros(&self, micros: i64) -> Self {
        Self(self.0.saturating_add(micros))
    }

    /// Returns the timestamp advanced by the given number of whole seconds.
    #[must_use]
    pub const fn plus_seconds(&self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds.saturating_mul(1_000_000)))
    }

    /// Renders the timestamp as RFC 3339 UTC with six fractional digits.
    ///
    /// This is the canonical form consumed by the content hash; the fixed
    /// fractional width keeps hashes stable across formatting layers.
    #[must_use]
    pub fn to_rfc3339_micros(&self) -> String {
        let format = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        );
        let nanos = i128::from(self.0).saturating_mul(1_000);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|instant| instant.format(&format).ok())
            .unwrap_or_default()
    }

    /// Parses an RFC 3339 string, truncating to microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] when the input is not valid RFC 3339.
    pub fn parse_rfc3339(input: &str) -> Result<Self, TimeParseError> {
        let instant = OffsetDateTime::parse(input, &Rfc3339)
            .map_err(|err| TimeParseError(err.to_string()))?;
        let micros = instant.unix_timestamp_nanos().div_euclid(1_000);
        let micros =
            i64::try_from(micros).map_err(|_| TimeParseError("timestamp out of range".into()))?;
        Ok(Self(micros))
    }

    /// Returns the `YYYY-MM` usage period containing this instant.
    #[must_use]
    pub fn period(&self) -> String {
        let nanos = i128::from(self.0).saturating_mul(1_000);
        OffsetDateTime::from_unix_timestamp_nanos(nanos).map_or_else(
            |_| "0000-00".to_string(),
            |instant| format!("{:04}-{:02}", instant.year(), u8::from(instant.month())),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339_micros())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339_micros())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}

/// Error raised when a timestamp string cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid timestamp: {0}")]
pub struct TimeParseError(String);

// ============================================================================
// SECTION: Clock Seam
// ============================================================================

/// Source of the current instant.
///
/// # Invariants
/// - Implementations return microsecond-truncated instants.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let micros = i64::try_from(nanos.div_euclid(1_000)).unwrap_or(i64::MAX);
        Timestamp::from_unix_micros(micros)
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current instant in unix microseconds.
    micros: Mutex<i64>,
}

impl ManualClock {
    /// Creates a manual clock starting at the provided instant.
    #[must_use]
    pub fn starting_at(instant: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            micros: Mutex::new(instant.unix_micros()),
        })
    }

    /// Sets the clock to the provided instant.
    pub fn set(&self, instant: Timestamp) {
        let mut guard = self.micros.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = instant.unix_micros();
    }

    /// Advances the clock by the given number of microseconds.
    pub fn advance_micros(&self, micros: i64) {
        let mut guard = self.micros.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = guard.saturating_add(micros);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let guard = self.micros.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Timestamp::from_unix_micros(*guard)
    }
}
