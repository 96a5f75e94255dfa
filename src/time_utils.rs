// SPDX-License-Identifier: MIT

//! Shared helpers for date/time handling.

use chrono::{DateTime, Local, Utc};

/// Current time as epoch seconds. All stored token expiries use this unit.
pub fn epoch_seconds_now() -> i64 {
    Utc::now().timestamp()
}

/// Format a played-at instant as a local wall-clock time for the
/// description song list.
pub fn format_local_time(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%H:%M:%S").to_string()
}
