//! Timestamp utilities
//!
//! Timestamps are stored as milliseconds since the Unix epoch so that SQLite
//! range comparisons (dedup window) stay numeric.

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as epoch milliseconds
pub fn now_ms() -> i64 {
    now().timestamp_millis()
}

/// Convert epoch milliseconds back to a UTC timestamp
///
/// Out-of-range values clamp to the epoch rather than failing.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Length of a window given in hours, in milliseconds
pub fn hours_to_millis(hours: u32) -> i64 {
    Duration::hours(i64::from(hours)).num_milliseconds()
}
