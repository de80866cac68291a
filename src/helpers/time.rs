use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::utils::constants::SAMPLE_WINDOW_MS;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// `(from, to)` in epoch milliseconds, one second wide and ending at `now_ms`.
pub fn sample_window(now_ms: i64) -> (i64, i64) {
    (now_ms - SAMPLE_WINDOW_MS, now_ms)
}

/// Readable form of a datapoint timestamp for log lines.
pub fn format_millis(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
