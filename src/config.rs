use crate::supervisor::SupervisorError;
use std::time::Duration;

/// Timing knobs for the supervisor loop.
///
/// There is no config file; defaults live here and `main` applies CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Sleep between ticks of the poll loop.
    pub poll_interval: Duration,
    /// How long a child gets after SIGTERM before it is sent SIGKILL.
    pub grace_period: Duration,
    pub backoff: BackoffConfig,
}

/// Delay schedule applied when the child cannot be spawned at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl SupervisorConfig {
    /// Reject settings that would busy-loop or invert the backoff schedule.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.poll_interval.is_zero() {
            return Err(SupervisorError::InvalidConfig {
                reason: "poll interval must be greater than zero".to_string(),
            });
        }
        if self.backoff.max_delay < self.backoff.initial_delay {
            return Err(SupervisorError::InvalidConfig {
                reason: format!(
                    "max backoff ({}ms) is shorter than the initial delay ({}ms)",
                    self.backoff.max_delay.as_millis(),
                    self.backoff.initial_delay.as_millis()
                ),
            });
        }
        Ok(())
    }
}

// --- Default implementations ---

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            grace_period: Duration::from_secs(2),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}
