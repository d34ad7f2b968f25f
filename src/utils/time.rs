use std::time::{SystemTime, UNIX_EPOCH};

/// Source timestamps are expressed in 100 nanosecond ticks
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks in one second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const TIMESTAMP_WRAP: i64 = 1 << 32;

/// Get current Unix timestamp in milliseconds, truncated to 32 bits
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Convert ticks to a 32-bit RTMP millisecond timestamp.
///
/// The value is rounded to the nearest millisecond and wrapped modulo 2^32.
pub fn ticks_to_rtmp_timestamp(ticks: i64) -> u32 {
    let millis = (ticks as f64 / TICKS_PER_MILLISECOND as f64).round() as i64;
    millis.rem_euclid(TIMESTAMP_WRAP) as u32
}

/// Convert milliseconds to ticks
pub fn millis_to_ticks(millis: i64) -> i64 {
    millis * TICKS_PER_MILLISECOND
}
