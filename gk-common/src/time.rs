//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Largest second count chrono accepts without panicking
const MAX_DURATION_SECS: u64 = (i64::MAX / 1000) as u64;

/// Convert whole seconds to a chrono duration (saturating)
pub fn secs_to_duration(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// `at + offset`, clamped to the latest representable instant
pub fn offset(at: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    at.checked_add_signed(offset).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Format a timestamp as a chat relative-time marker (`<t:UNIX:R>`)
pub fn relative_marker(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

/// Format a timestamp as a chat absolute-time marker (`<t:UNIX>`)
pub fn absolute_marker(at: DateTime<Utc>) -> String {
    format!("<t:{}>", at.timestamp())
}
