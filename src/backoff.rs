/// Retry delay after consecutive spawn failures.
///
/// Returns `initial_delay * 2^(failures - 1)`, capped at `max_delay`. The first
/// failure waits exactly `initial_delay`.
use crate::config::BackoffConfig;
use std::time::Duration;

pub fn spawn_retry_delay(config: &BackoffConfig, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    config
        .initial_delay
        .checked_mul(factor)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}
