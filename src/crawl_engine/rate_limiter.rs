//! Rolling-window rate limiter for outbound service calls
//!
//! Each service name gets its own window of call timestamps. A call is admitted
//! when fewer than `quota` calls happened in the last `window`; otherwise the
//! caller waits until the oldest call leaves the window.
//!
//! Key features:
//! - Async-friendly with `tokio::sync` primitives
//! - Per-service windows with independent quotas
//! - FIFO admission: the per-service mutex is fair and is held while waiting
//! - A quota of 0 disables limiting for that service

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::debug;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::utils::{DEFAULT_CALLS_PER_MINUTE, RATE_LIMIT_WINDOW_SECS};

/// Rate limit decision for a non-blocking check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Call is allowed and has been recorded
    Allow,
    /// Call would exceed the quota
    /// Contains the duration to wait before retrying
    Deny { retry_after: Duration },
}

type CallWindow = Arc<Mutex<VecDeque<Instant>>>;

/// Per-service rolling-window rate limiter
pub struct RateLimiter {
    windows: DashMap<String, CallWindow>,
    quotas: HashMap<String, u32>,
    default_quota: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with a default per-minute quota for every service
    #[must_use]
    pub fn new(default_calls_per_minute: u32) -> Self {
        Self::with_window(
            default_calls_per_minute,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )
    }

    /// Create a limiter with a custom window length
    #[must_use]
    pub fn with_window(default_quota: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            quotas: HashMap::new(),
            default_quota,
            window,
        }
    }

    /// Override the quota for one service
    #[must_use]
    pub fn with_quota(mut self, service: impl Into<String>, calls_per_window: u32) -> Self {
        self.quotas.insert(service.into(), calls_per_window);
        self
    }

    #[must_use]
    pub fn quota_for(&self, service: &str) -> u32 {
        self.quotas
            .get(service)
            .copied()
            .unwrap_or(self.default_quota)
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_for(&self, service: &str) -> CallWindow {
        self.windows
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = calls.front() {
            if now.saturating_duration_since(oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wait until a call to `service` is permitted, then record it.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self, service: &str) -> Duration {
        let quota = self.quota_for(service) as usize;
        if quota == 0 {
            return Duration::ZERO;
        }

        let window = self.window_for(service);
        let mut calls = window.lock().await;
        let mut waited = Duration::ZERO;

        loop {
            let now = Instant::now();
            Self::prune(&mut calls, now, self.window);

            if calls.len() < quota {
                calls.push_back(now);
                return waited;
            }

            let Some(&oldest) = calls.front() else {
                continue;
            };
            let wait = (oldest + self.window).saturating_duration_since(now);
            debug!(
                "Rate limit reached for service '{service}' ({quota} per {:?}), waiting {wait:?}",
                self.window
            );
            sleep(wait).await;
            waited += wait;
        }
    }

    /// Record a call only if it is permitted right now
    pub async fn try_acquire(&self, service: &str) -> RateLimitDecision {
        let quota = self.quota_for(service) as usize;
        if quota == 0 {
            return RateLimitDecision::Allow;
        }

        let window = self.window_for(service);
        let mut calls = window.lock().await;
        let now = Instant::now();
        Self::prune(&mut calls, now, self.window);

        if calls.len() < quota {
            calls.push_back(now);
            return RateLimitDecision::Allow;
        }

        let retry_after = calls
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        RateLimitDecision::Deny { retry_after }
    }

    /// Number of calls currently inside the window for `service`
    pub async fn in_window(&self, service: &str) -> usize {
        let window = self.window_for(service);
        let mut calls = window.lock().await;
        Self::prune(&mut calls, Instant::now(), self.window);
        calls.len()
    }

    /// Get the number of services currently being tracked
    #[must_use]
    pub fn tracked_service_count(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CALLS_PER_MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_quota_then_waits_for_window() {
        let limiter = RateLimiter::with_window(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert_eq!(limiter.acquire("llm").await, Duration::ZERO);
        }

        let started = Instant::now();
        let waited = limiter.acquire("llm").await;
        assert_eq!(waited, Duration::from_secs(60));
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_independent() {
        let limiter = RateLimiter::with_window(1, Duration::from_secs(60));

        assert_eq!(limiter.try_acquire("fetch").await, RateLimitDecision::Allow);
        assert_eq!(limiter.try_acquire("search").await, RateLimitDecision::Allow);
        assert!(matches!(
            limiter.try_acquire("fetch").await,
            RateLimitDecision::Deny { .. }
        ));
        assert_eq!(limiter.tracked_service_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_service_quota_override() {
        let limiter = RateLimiter::with_window(1, Duration::from_secs(60)).with_quota("fetch", 2);
        assert_eq!(limiter.quota_for("fetch"), 2);
        assert_eq!(limiter.quota_for("other"), 1);

        assert_eq!(limiter.try_acquire("fetch").await, RateLimitDecision::Allow);
        assert_eq!(limiter.try_acquire("fetch").await, RateLimitDecision::Allow);
        assert!(matches!(
            limiter.try_acquire("fetch").await,
            RateLimitDecision::Deny { .. }
        ));
    }

    #[tokio::test]
    async fn test_zero_quota_disables_limiting() {
        let limiter = RateLimiter::with_window(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert_eq!(limiter.acquire("fetch").await, Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_reports_time_until_oldest_expires() {
        let limiter = RateLimiter::with_window(1, Duration::from_secs(60));
        assert_eq!(limiter.try_acquire("fetch").await, RateLimitDecision::Allow);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            limiter.try_acquire("fetch").await,
            RateLimitDecision::Deny {
                retry_after: Duration::from_secs(40)
            }
        );

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(limiter.try_acquire("fetch").await, RateLimitDecision::Allow);
        assert_eq!(limiter.in_window("fetch").await, 1);
    }
}
