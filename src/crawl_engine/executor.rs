//! Resilient execution of a single logical network call.
//!
//! Composes the response cache, the circuit breaker, the rate limiter and a
//! [`RetryPolicy`]:
//!
//! 1. cache hit returns immediately
//! 2. open circuit fails fast with `ServiceUnavailable`
//! 3. every attempt waits for a rate-limit slot
//! 4. transient failures (network, 5xx, 429) are retried with backoff,
//!    other 4xx fail immediately
//! 5. the final result is a tagged [`RequestOutcome`], never an `Err`

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::crawl_types::{FailureKind, FailureReason, RequestError, RequestOutcome};
use super::rate_limiter::RateLimiter;
use super::response_cache::ResponseCache;
use super::retry::RetryPolicy;

/// Canonical description of a request, used as the cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub service: String,
    pub method: String,
    pub target: String,
    pub params: BTreeMap<String, String>,
}

impl RequestSignature {
    #[must_use]
    pub fn new(service: impl Into<String>, method: &str, target: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.to_ascii_uppercase(),
            target: target.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Stable key: `<service>:<xxh3 hex>` of method, target and sorted params
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut canonical = format!("{} {}", self.method, self.target);
        for (key, value) in &self.params {
            canonical.push('\n');
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(value);
        }
        format!(
            "{}:{}",
            self.service,
            hex::encode(xxh3_64(canonical.as_bytes()).to_be_bytes())
        )
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Skip the cache lookup (the fresh result is still cached)
    pub bypass_cache: bool,
}

/// Executes calls through cache, circuit breaker, rate limiter and retries
pub struct ResilientRequestExecutor<V> {
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
    cache: Arc<ResponseCache<V>>,
    retry_policy: RetryPolicy,
}

impl<V: Clone> ResilientRequestExecutor<V> {
    #[must_use]
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        circuit_breaker: Arc<CircuitBreaker>,
        cache: Arc<ResponseCache<V>>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            rate_limiter,
            circuit_breaker,
            cache,
            retry_policy,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    #[must_use]
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache<V>> {
        &self.cache
    }

    /// Execute `request_fn` against `service` with default options
    pub async fn execute<F, Fut>(
        &self,
        service: &str,
        signature: &RequestSignature,
        request_fn: F,
    ) -> RequestOutcome<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, RequestError>>,
    {
        self.execute_with(service, signature, ExecuteOptions::default(), request_fn)
            .await
    }

    /// Execute `request_fn` against `service`
    ///
    /// `request_fn` is invoked once per attempt.
    pub async fn execute_with<F, Fut>(
        &self,
        service: &str,
        signature: &RequestSignature,
        options: ExecuteOptions,
        mut request_fn: F,
    ) -> RequestOutcome<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, RequestError>>,
    {
        let key = signature.cache_key();

        if !options.bypass_cache {
            if let Some(value) = self.cache.get(&key, self.cache.default_ttl()) {
                debug!("Cache hit for {service} request {}", signature.target);
                return RequestOutcome::Success {
                    value,
                    from_cache: true,
                    attempts: 0,
                };
            }
        }

        if self.circuit_breaker.is_open(service) {
            warn!(
                "Rejecting {service} request {}: circuit open",
                signature.target
            );
            return RequestOutcome::Failure {
                reason: FailureReason::ServiceUnavailable {
                    service: service.to_string(),
                },
                attempts: 0,
            };
        }

        // A half-open circuit admits a single trial call, not a retry sequence
        let max_attempts = if self.circuit_breaker.state(service) == CircuitState::HalfOpen {
            1
        } else {
            self.retry_policy.max_attempts.max(1)
        };

        let mut attempt: u32 = 0;
        let last_error = loop {
            self.rate_limiter.acquire(service).await;
            attempt += 1;

            let error = match request_fn().await {
                Ok(value) => {
                    self.circuit_breaker.record_success(service);
                    self.cache.set(key, value.clone());
                    if attempt > 1 {
                        tracing::info!(service, attempt, "Request succeeded after retry");
                    }
                    return RequestOutcome::Success {
                        value,
                        from_cache: false,
                        attempts: attempt,
                    };
                }
                Err(error) => error,
            };

            let kind = error.kind();
            if !kind.is_retryable() {
                self.circuit_breaker
                    .record_failure(service, &error.to_string());
                let reason = match (kind, error) {
                    (FailureKind::Client, RequestError::Status { status, message }) => {
                        FailureReason::ClientError { status, message }
                    }
                    (_, other) => FailureReason::RequestFailed {
                        message: other.to_string(),
                    },
                };
                warn!("{service} request {} failed permanently: {reason}", signature.target);
                return RequestOutcome::Failure {
                    reason,
                    attempts: attempt,
                };
            }

            if attempt >= max_attempts {
                break error;
            }

            let delay = self.retry_policy.delay_for_attempt(attempt - 1);
            tracing::warn!(
                service,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request after transient failure"
            );
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        };

        let last_error = last_error.to_string();
        self.circuit_breaker.record_failure(service, &last_error);
        tracing::error!(
            service,
            attempts = attempt,
            error = %last_error,
            "Max retry attempts exceeded"
        );

        RequestOutcome::Failure {
            reason: FailureReason::RetriesExhausted {
                attempts: attempt,
                last_error,
            },
            attempts: attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(threshold: u32, reset: Duration) -> ResilientRequestExecutor<String> {
        ResilientRequestExecutor::new(
            Arc::new(RateLimiter::new(0)),
            Arc::new(CircuitBreaker::new(threshold, reset)),
            Arc::new(ResponseCache::new(16, Duration::from_secs(60))),
            RetryPolicy::immediate(3),
        )
    }

    #[test]
    fn test_signature_ignores_param_insertion_order() {
        let a = RequestSignature::new("fetch", "get", "https://example.com")
            .with_param("b", "2")
            .with_param("a", "1");
        let b = RequestSignature::new("fetch", "GET", "https://example.com")
            .with_param("a", "1")
            .with_param("b", "2");
        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("fetch:"));
        assert_ne!(
            a.cache_key(),
            RequestSignature::new("fetch", "GET", "https://example.com").cache_key()
        );
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let exec = executor(5, Duration::from_secs(60));
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/a");
        let calls = AtomicU32::new(0);

        let first = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RequestError>("body".to_string())
            })
            .await;
        assert!(matches!(first, RequestOutcome::Success { from_cache: false, attempts: 1, .. }));

        let second = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RequestError>("other".to_string())
            })
            .await;
        assert!(matches!(second, RequestOutcome::Success { from_cache: true, .. }));
        assert_eq!(second.into_result().expect("cached"), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bypass_cache_calls_again() {
        let exec = executor(5, Duration::from_secs(60));
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/a");
        exec.execute("fetch", &sig, || async { Ok::<_, RequestError>("v1".to_string()) })
            .await;

        let forced = exec
            .execute_with(
                "fetch",
                &sig,
                ExecuteOptions { bypass_cache: true },
                || async { Ok::<_, RequestError>("v2".to_string()) },
            )
            .await;
        assert_eq!(forced.into_result().expect("fresh"), "v2");
        assert_eq!(exec.cache().get(&sig.cache_key(), Duration::from_secs(60)), Some("v2".into()));
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let exec = executor(5, Duration::from_secs(60));
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/missing");
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(RequestError::status(404, "Not Found"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match outcome {
            RequestOutcome::Failure { reason, attempts } => {
                assert_eq!(attempts, 1);
                assert!(matches!(reason, FailureReason::ClientError { status: 404, .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let circuit = exec.circuit_breaker().circuit("fetch").expect("circuit");
        assert_eq!(circuit.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_server_errors_and_throttling_are_retried() {
        let exec = executor(5, Duration::from_secs(60));
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/flaky");
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute("fetch", &sig, || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(RequestError::status(503, "Service Unavailable")),
                    1 => Err(RequestError::status(429, "Too Many Requests")),
                    _ => Ok("ok".to_string()),
                }
            })
            .await;

        assert!(matches!(outcome, RequestOutcome::Success { attempts: 3, .. }));
        assert_eq!(
            exec.circuit_breaker().circuit("fetch").expect("circuit").consecutive_failures,
            0
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_one_failure() {
        let exec = executor(5, Duration::from_secs(60));
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/down");
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(RequestError::Timeout("deadline".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            outcome,
            RequestOutcome::Failure {
                reason: FailureReason::RetriesExhausted { attempts: 3, .. },
                ..
            }
        ));
        assert_eq!(
            exec.circuit_breaker().circuit("fetch").expect("circuit").consecutive_failures,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let exec: ResilientRequestExecutor<String> = ResilientRequestExecutor::new(
            Arc::new(RateLimiter::new(0)),
            Arc::new(CircuitBreaker::new(5, Duration::from_secs(60))),
            Arc::new(ResponseCache::new(16, Duration::from_secs(60))),
            RetryPolicy::default(),
        );
        let sig = RequestSignature::new("fetch", "GET", "https://example.com/slow");
        let started = tokio::time::Instant::now();

        let outcome = exec
            .execute("fetch", &sig, || async {
                Err::<String, _>(RequestError::Connection("refused".into()))
            })
            .await;

        assert!(!outcome.is_success());
        // Two waits: [1s, 2s) and [2s, 3s)
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed <= Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_call_then_admits_one_trial() {
        let exec = executor(5, Duration::from_millis(50));
        let calls = AtomicU32::new(0);

        for i in 0..5 {
            let sig = RequestSignature::new("fetch", "GET", format!("https://example.com/{i}"));
            let outcome = exec
                .execute("fetch", &sig, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(RequestError::status(400, "Bad Request"))
                })
                .await;
            assert!(!outcome.is_success());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let sig = RequestSignature::new("fetch", "GET", "https://example.com/6");
        let rejected = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RequestError>("never".to_string())
            })
            .await;
        assert!(matches!(
            rejected,
            RequestOutcome::Failure {
                reason: FailureReason::ServiceUnavailable { .. },
                attempts: 0
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5, "no network attempt while open");

        tokio::time::sleep(Duration::from_millis(80)).await;

        let trial = exec
            .execute("fetch", &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(RequestError::status(503, "still down"))
            })
            .await;
        assert_eq!(trial.attempts(), 1, "half-open admits a single trial call");
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(exec.circuit_breaker().is_open("fetch"), "failed trial re-opens");
    }
}
