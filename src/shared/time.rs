//! Usage: Wall-clock helpers (unix seconds / milliseconds).

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(crate) fn now_unix_seconds() -> i64 {
    now_unix_millis() / 1000
}
