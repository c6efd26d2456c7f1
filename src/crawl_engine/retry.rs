//! Retry policy value object.
//!
//! Backoff for attempt `n` (0-based index of the attempt that just failed) is
//! `base_delay * 2^n + jitter`, with jitter drawn uniformly from
//! `[jitter_min, jitter_max)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_JITTER_MAX_MS};

/// Cap on the backoff exponent (2^16 base units)
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::from_millis(DEFAULT_RETRY_JITTER_MAX_MS),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Policy with no waiting between attempts
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter_min = min;
        self.jitter_max = max.max(min);
        self
    }

    /// Deterministic part of the delay: `base_delay * 2^attempt`
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Smallest and largest delay `delay_for_attempt` can return
    #[must_use]
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let backoff = self.backoff(attempt);
        (
            backoff.saturating_add(self.jitter_min),
            backoff.saturating_add(self.jitter_max.max(self.jitter_min)),
        )
    }

    /// Delay for a given position in `[0, 1)` of the jitter range
    #[must_use]
    pub fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        let (lo, hi) = self.delay_bounds(attempt);
        let span = hi.saturating_sub(lo);
        lo.saturating_add(span.mul_f64(unit.clamp(0.0, 1.0)))
    }

    /// Randomized delay before the next attempt
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }
}
