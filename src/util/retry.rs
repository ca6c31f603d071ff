//! Exponential backoff with full jitter, one `RetryConfig` per external
//! capability rather than a single global policy (spec §5).

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryConfig {
    /// Maximum attempts, including the first.
    pub(crate) max_attempts: usize,
    pub(crate) base_delay_ms: u64,
    pub(crate) max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub(crate) const fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Full-jitter delay for the given attempt (0-indexed; attempt 0 never waits).
    pub(crate) fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        let exponential = self
            .base_delay_ms
            .saturating_mul(1_u64.saturating_shl((attempt - 1) as u32));
        let capped = exponential.min(self.max_delay_ms);
        let jittered = if capped > 0 {
            rand::thread_rng().gen_range(0..=capped)
        } else {
            0
        };
        Duration::from_millis(jittered)
    }

    pub(crate) const fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

/// A rate-limited provider can hand back an explicit retry-after delay; when
/// it doesn't, fall back to a fixed backoff (spec §5).
pub(crate) fn rate_limit_delay(retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or(Duration::from_secs(5))
}
