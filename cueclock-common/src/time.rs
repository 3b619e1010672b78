//! Millisecond wall-clock helpers
//!
//! All timing math in CueClock runs on signed 64-bit millisecond values.
//! These helpers are the single place converting from the system clock.

use chrono::{DateTime, TimeZone, Utc};

/// Current wall-clock time in ms since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a millisecond timestamp to a `DateTime<Utc>` for event payloads
///
/// Out-of-range values clamp to the epoch; timing math never produces them.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}
