//! Transaction timestamps.
//!
//! Every capture reads `now` once per transaction from a `Clock`. Production
//! uses `SystemClock`; tests and replays use `ManualClock`.
//!
//! Timestamps are stored as RFC 3339 text with fixed microsecond precision
//! and a `Z` suffix, so lexical order in SQL equals temporal order.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::errors::CoreError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to microseconds to match stored precision.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_micros(Utc::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.micros.store(at.timestamp_micros(), Ordering::SeqCst);
    }

    /// Move forward (or backward, for skew tests) and return the new time.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        let micros = self.micros.fetch_add(delta, Ordering::SeqCst) + delta;
        DateTime::from_timestamp_micros(micros).unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[must_use]
pub fn truncate_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

/// Storage format for validity range bounds.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored validity bound.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the text is not RFC 3339.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Validation(format!("Failed to parse timestamp '{s}': {e}")))
}
