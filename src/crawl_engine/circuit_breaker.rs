//! Circuit breaker pattern for service-level failure isolation
//!
//! This module implements the circuit breaker pattern to detect consistently
//! failing downstream services and fail fast instead of calling them.
//!
//! The circuit breaker tracks service health across three states:
//! - Closed: Normal operation, requests proceed
//! - Open: Too many failures, requests are blocked until `open_until`
//! - `HalfOpen`: Cooldown elapsed, exactly one trial request is admitted
//!
//! State is keyed by service name and shared by every caller holding the same
//! `CircuitBreaker`, so failures seen by one crawler affect all of them.

use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::utils::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT_SECS};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests proceed
    Closed,
    /// Failing - reject requests without calling the service
    Open,
    /// Testing after cooldown - a single trial request is allowed
    HalfOpen,
}

/// Health tracking for a single downstream service
///
/// Invariant: `half_open` implies `open_until.is_none()`.
#[derive(Debug, Clone)]
pub struct ServiceCircuit {
    pub service_name: String,
    /// Number of consecutive failures without success
    pub consecutive_failures: u32,
    /// Requests are rejected while this instant is in the future
    pub open_until: Option<Instant>,
    pub half_open: bool,
    /// A half-open trial has been admitted and not yet reported
    pub trial_in_flight: bool,
    pub last_error: Option<String>,
}

impl ServiceCircuit {
    fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            consecutive_failures: 0,
            open_until: None,
            half_open: false,
            trial_in_flight: false,
            last_error: None,
        }
    }

    /// Current state as observed at `now`, without transitioning
    #[must_use]
    pub fn state_at(&self, now: Instant) -> CircuitState {
        if self.half_open {
            return CircuitState::HalfOpen;
        }
        match self.open_until {
            Some(until) if now < until => CircuitState::Open,
            // Cooldown elapsed: the next caller becomes the trial
            Some(_) => CircuitState::HalfOpen,
            None => CircuitState::Closed,
        }
    }
}

/// Serializable view of a service circuit for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub service_name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Milliseconds until a trial call is admitted, when open
    pub retry_after_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// Circuit breaker registry keyed by service name
pub struct CircuitBreaker {
    circuits: DashMap<String, ServiceCircuit>,
    /// Number of consecutive failures before opening circuit
    failure_threshold: u32,
    /// How long an open circuit rejects callers
    reset_timeout: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the specified threshold and cooldown
    ///
    /// # Arguments
    /// * `failure_threshold` - Open circuit after this many consecutive failures
    /// * `reset_timeout` - Duration to reject calls before admitting a trial
    #[must_use]
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            circuits: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Check whether calls to `service` must be rejected
    ///
    /// Returns true while the circuit is open. Once the cooldown has passed
    /// the circuit moves to half-open and this returns false for exactly one
    /// caller; later callers are rejected until that trial is reported through
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn is_open(&self, service: &str) -> bool {
        let mut circuit = self
            .circuits
            .entry(service.to_string())
            .or_insert_with(|| ServiceCircuit::new(service));
        let now = Instant::now();

        if let Some(until) = circuit.open_until {
            if now < until {
                return true;
            }
            circuit.open_until = None;
            circuit.half_open = true;
            circuit.trial_in_flight = true;
            info!("Circuit breaker HALF-OPEN for service: {service}, admitting trial call");
            return false;
        }

        if circuit.half_open {
            if circuit.trial_in_flight {
                debug!("Circuit breaker HALF-OPEN for service: {service}, trial in flight");
                return true;
            }
            circuit.trial_in_flight = true;
        }

        false
    }

    /// Record a successful call to a service
    ///
    /// Resets the failure count; a half-open circuit closes.
    pub fn record_success(&self, service: &str) {
        let mut circuit = self
            .circuits
            .entry(service.to_string())
            .or_insert_with(|| ServiceCircuit::new(service));

        circuit.consecutive_failures = 0;
        circuit.last_error = None;

        if circuit.half_open {
            circuit.half_open = false;
            circuit.trial_in_flight = false;
            info!("Circuit breaker CLOSED for service: {service}");
        }
    }

    /// Record a failed call to a service
    ///
    /// Opens the circuit when the failure count reaches the threshold, or
    /// immediately when the failing call was the half-open trial.
    pub fn record_failure(&self, service: &str, error: &str) {
        let mut circuit = self
            .circuits
            .entry(service.to_string())
            .or_insert_with(|| ServiceCircuit::new(service));
        let now = Instant::now();

        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        circuit.last_error = Some(error.to_string());

        let already_open = circuit.open_until.is_some_and(|until| now < until);
        if already_open {
            return;
        }

        if circuit.half_open || circuit.consecutive_failures >= self.failure_threshold {
            circuit.open_until = Some(now + self.reset_timeout);
            circuit.half_open = false;
            circuit.trial_in_flight = false;
            warn!(
                "Circuit breaker OPEN for service {} after {} consecutive failures. Last error: {}",
                service, circuit.consecutive_failures, error
            );
        } else {
            debug!(
                "Circuit breaker failure for service: {} ({}/{}): {}",
                service, circuit.consecutive_failures, self.failure_threshold, error
            );
        }
    }

    /// Get the state of a service without transitioning it
    #[must_use]
    pub fn state(&self, service: &str) -> CircuitState {
        self.circuits
            .get(service)
            .map(|c| c.state_at(Instant::now()))
            .unwrap_or(CircuitState::Closed)
    }

    /// Get a copy of the raw circuit for a service
    ///
    /// Returns None if the service has not been seen yet.
    #[must_use]
    pub fn circuit(&self, service: &str) -> Option<ServiceCircuit> {
        self.circuits.get(service).map(|c| c.value().clone())
    }

    #[must_use]
    pub fn snapshot(&self, service: &str) -> Option<CircuitSnapshot> {
        let now = Instant::now();
        self.circuits.get(service).map(|c| CircuitSnapshot {
            service_name: c.service_name.clone(),
            state: c.state_at(now),
            consecutive_failures: c.consecutive_failures,
            retry_after_ms: c
                .open_until
                .filter(|until| now < *until)
                .map(|until| until.saturating_duration_since(now).as_millis() as u64),
            last_error: c.last_error.clone(),
        })
    }

    /// Get list of services currently rejecting calls
    #[must_use]
    pub fn open_services(&self) -> Vec<String> {
        let now = Instant::now();
        let mut open: Vec<String> = self
            .circuits
            .iter()
            .filter(|entry| entry.value().state_at(now) == CircuitState::Open)
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            DEFAULT_FAILURE_THRESHOLD,
            Duration::from_secs(DEFAULT_RESET_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_state_resets_failures_on_success() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!cb.is_open("fetch"));
        cb.record_failure("fetch", "boom");
        cb.record_failure("fetch", "boom");
        cb.record_success("fetch");

        let circuit = cb.circuit("fetch").expect("circuit exists after calls");
        assert_eq!(circuit.consecutive_failures, 0);
        assert_eq!(cb.state("fetch"), CircuitState::Closed);
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));

        cb.record_failure("fetch", "test error");
        assert!(!cb.is_open("fetch"));
        cb.record_failure("fetch", "test error");
        assert!(!cb.is_open("fetch"));
        cb.record_failure("fetch", "test error");

        assert!(cb.is_open("fetch"));
        assert_eq!(cb.state("fetch"), CircuitState::Open);
        assert_eq!(cb.open_services(), vec!["fetch".to_string()]);
        // Other services are unaffected
        assert!(!cb.is_open("summarize"));
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(50));
        cb.record_failure("fetch", "e");
        cb.record_failure("fetch", "e");
        assert!(cb.is_open("fetch"));

        std::thread::sleep(Duration::from_millis(80));

        assert!(!cb.is_open("fetch"), "first caller after cooldown is the trial");
        assert!(cb.is_open("fetch"), "second caller is rejected while trial runs");
        assert_eq!(cb.state("fetch"), CircuitState::HalfOpen);

        let circuit = cb.circuit("fetch").expect("circuit");
        assert!(circuit.half_open);
        assert!(circuit.open_until.is_none());
    }

    #[test]
    fn test_trial_success_closes() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(30));
        cb.record_failure("fetch", "e");
        std::thread::sleep(Duration::from_millis(50));

        assert!(!cb.is_open("fetch"));
        cb.record_success("fetch");
        assert_eq!(cb.state("fetch"), CircuitState::Closed);
        assert!(!cb.is_open("fetch"));
        assert!(!cb.is_open("fetch"));
    }

    #[test]
    fn test_trial_failure_reopens_regardless_of_count() {
        let cb = CircuitBreaker::new(10, Duration::from_millis(30));
        for _ in 0..10 {
            cb.record_failure("fetch", "e");
        }
        std::thread::sleep(Duration::from_millis(50));
        assert!(!cb.is_open("fetch"));

        // Pretend a success reset happened elsewhere: the count is irrelevant in half-open
        cb.circuits
            .get_mut("fetch")
            .expect("circuit")
            .consecutive_failures = 0;
        cb.record_failure("fetch", "still down");

        assert!(cb.is_open("fetch"));
        let snapshot = cb.snapshot("fetch").expect("snapshot");
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.retry_after_ms.is_some());
        assert_eq!(snapshot.last_error.as_deref(), Some("still down"));
    }
}
