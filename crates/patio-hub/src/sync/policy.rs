//! Timeouts and publish retry policy for configuration sync.

use std::time::Duration;

use patio_core::config::SyncConfig;

/// Bounds on one configuration-change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Upper bound on every storage and publish call.
    pub op_timeout: Duration,
    /// Publish attempts before the change is reverted. 1 means no retry.
    pub notify_attempts: u32,
    /// Delay before the first retry, doubled for each one after.
    pub retry_backoff: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
            notify_attempts: 1,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl From<&SyncConfig> for SyncPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            op_timeout: Duration::from_secs(config.op_timeout_secs),
            notify_attempts: config.notify_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl SyncPolicy {
    /// Delay after the failed publish `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor)
    }

    /// Whether another publish should follow the failed `attempt`.
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.notify_attempts
    }
}
