//! Modification timestamps
//!
//! Millisecond wall-clock timestamps with an explicit tie-break: when the
//! clock has not advanced past the previous stamp, the new stamp is
//! `previous + 1`. This keeps per-id and per-collection timestamps strictly
//! monotonic even under sub-resolution bursts of mutations.

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Next modification timestamp after `previous`.
///
/// Returns the current time, or `previous + 1` when the clock has not
/// advanced beyond it.
pub fn update_timestamp(previous: u64) -> u64 {
    let now = now_millis();
    if now > previous {
        now
    } else {
        previous + 1
    }
}
