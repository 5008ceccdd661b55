#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Current wall-clock time as UTC epoch seconds, the unit every stored
/// timestamp uses.
pub fn utc_now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
