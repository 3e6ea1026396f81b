//! Reconnect delay computation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::ReconnectConfig;

/// Delay before reconnect attempt `attempt` (1-based).
///
/// `min(base_ms * multiplier^attempt, max_ms)`, plus up to `jitter_ms`.
pub fn reconnect_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = config.base_ms as f64 * config.multiplier.powi(exponent);
    let capped = if scaled.is_finite() {
        scaled.min(config.max_ms as f64) as u64
    } else {
        config.max_ms
    };
    Duration::from_millis(jittered_backoff(capped, config.jitter_ms))
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
