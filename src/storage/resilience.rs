//! Circuit breaking for knowledge stores.
//!
//! A store that keeps failing is cut off for a cool-down period so callers
//! get a fast `StoreUnavailable` instead of piling onto an unhealthy backend.
//!
//! ```text
//! Closed ──(N consecutive failures)──▶ Open ──(reset timeout)──▶ HalfOpen
//!   ▲                                   ▲                           │
//!   └───────────── trial success ───────┼──── trial failure ────────┘
//! ```
//!
//! The engine itself never retries; retry policy belongs to the caller.

use crate::models::{KnowledgeObject, ObjectFilter, ObjectId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::traits::KnowledgeStore;

/// Circuit breaker settings for a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreResilienceConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub reset_timeout_ms: u64,
    /// Trial calls allowed while half-open.
    pub half_open_max_calls: u32,
    /// Calls slower than this are logged at warn level.
    pub slow_call_ms: u64,
}

impl Default for StoreResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_calls: 1,
            slow_call_ms: 2_000,
        }
    }
}

impl StoreResilienceConfig {
    /// Loads settings from environment variables over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `REGDEDUP_STORE_BREAKER_*` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("REGDEDUP_STORE_BREAKER_FAILURE_THRESHOLD") {
            self.failure_threshold = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("REGDEDUP_STORE_BREAKER_RESET_MS") {
            self.reset_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("REGDEDUP_STORE_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.half_open_max_calls = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("REGDEDUP_STORE_SLOW_CALL_MS") {
            self.slow_call_ms = v;
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }

    /// Sets the half-open trial budget.
    #[must_use]
    pub const fn with_half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.half_open_max_calls = max_calls;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    backend: &'static str,
}

impl CircuitBreaker {
    /// Creates a closed breaker. Zero thresholds are raised to one.
    #[must_use]
    pub fn new(config: &StoreResilienceConfig, backend: &'static str) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            backend,
        }
    }

    /// Returns true if a call may proceed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } if opened_at.elapsed() >= self.reset_timeout => {
                tracing::info!(backend = self.backend, "Store circuit half-open, allowing trial call");
                self.state = BreakerState::HalfOpen { attempts: 1 };
                true
            },
            BreakerState::Open { .. } => false,
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts < self.half_open_max_calls {
                    *attempts += 1;
                    true
                } else {
                    false
                }
            },
        }
    }

    /// Records a success and closes the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(backend = self.backend, "Store circuit closed");
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failure; returns true if the circuit just opened.
    pub fn on_failure(&mut self) -> bool {
        let trip = match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                *failures >= self.failure_threshold
            },
            BreakerState::HalfOpen { .. } => true,
            BreakerState::Open { .. } => false,
        };
        if trip {
            tracing::warn!(
                backend = self.backend,
                threshold = self.failure_threshold,
                reset_ms = u64::try_from(self.reset_timeout.as_millis()).unwrap_or(u64::MAX),
                "Store circuit opened"
            );
            self.state = BreakerState::Open {
                opened_at: Instant::now(),
            };
        }
        trip
    }

    /// Numeric state for the gauge: 0 closed, 1 open, 2 half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Store wrapper that adds a circuit breaker, request metrics, and slow-call
/// logging, and maps every inner failure to [`Error::StoreUnavailable`].
pub struct ResilientStore<S: KnowledgeStore> {
    inner: S,
    breaker: Mutex<CircuitBreaker>,
    slow_call: Duration,
}

impl<S: KnowledgeStore> ResilientStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S, config: &StoreResilienceConfig) -> Self {
        let backend = inner.name();
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(config, backend)),
            slow_call: Duration::from_millis(config.slow_call_ms),
        }
    }

    /// Returns the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the breaker state (0 closed, 1 open, 2 half-open).
    pub fn circuit_state(&self) -> u8 {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state_value()
    }

    fn execute<T>(&self, operation: &'static str, call: impl FnOnce() -> Result<T>) -> Result<T> {
        let backend = self.inner.name();
        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            record(backend, operation, "circuit_open", state);
            return Err(Error::StoreUnavailable {
                operation: operation.to_string(),
                cause: format!("circuit breaker open for store '{backend}'"),
            });
        }
        drop(breaker);

        let start = Instant::now();
        let result = call();
        let elapsed = start.elapsed();
        if elapsed >= self.slow_call {
            tracing::warn!(
                backend,
                operation,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "Slow store call"
            );
        }

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        let status = if result.is_ok() {
            breaker.on_success();
            "success"
        } else {
            breaker.on_failure();
            "error"
        };
        let state = breaker.state_value();
        drop(breaker);
        record(backend, operation, status, state);

        result.map_err(|e| match e {
            Error::StoreUnavailable { .. } => e,
            other => Error::StoreUnavailable {
                operation: operation.to_string(),
                cause: other.to_string(),
            },
        })
    }
}

fn record(backend: &'static str, operation: &'static str, status: &'static str, state: u8) {
    metrics::counter!(
        "store_requests_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::gauge!("store_circuit_breaker_state", "backend" => backend).set(f64::from(state));
}

impl<S: KnowledgeStore> KnowledgeStore for ResilientStore<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn list_objects(&self, filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>> {
        self.execute("list_objects", || self.inner.list_objects(filter))
    }

    fn remove_objects(&self, ids: &BTreeSet<ObjectId>) -> Result<usize> {
        self.execute("remove_objects", || self.inner.remove_objects(ids))
    }

    fn count(&self, filter: &ObjectFilter) -> Result<usize> {
        self.execute("count", || self.inner.count(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyStore {
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failing: bool) -> Self {
            Self {
                failing: AtomicBool::new(failing),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl KnowledgeStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn list_objects(&self, _filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(Error::OperationFailed {
                    operation: "query".to_string(),
                    cause: "connection reset".to_string(),
                })
            } else {
                Ok(Vec::new())
            }
        }

        fn remove_objects(&self, _ids: &BTreeSet<ObjectId>) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let config = StoreResilienceConfig::default().with_failure_threshold(3);
        let mut breaker = CircuitBreaker::new(&config, "test");

        assert!(!breaker.on_failure());
        assert!(!breaker.on_failure());
        assert_eq!(breaker.state_value(), 0);
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_breaker_half_open_trial() {
        let config = StoreResilienceConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout_ms(0)
            .with_half_open_max_calls(1);
        let mut breaker = CircuitBreaker::new(&config, "test");

        breaker.on_failure();
        assert!(breaker.allow());
        assert_eq!(breaker.state_value(), 2);
        assert!(!breaker.allow());

        breaker.on_success();
        assert_eq!(breaker.state_value(), 0);
    }

    #[test]
    fn test_breaker_reopens_on_trial_failure() {
        let config = StoreResilienceConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout_ms(0);
        let mut breaker = CircuitBreaker::new(&config, "test");

        breaker.on_failure();
        assert!(breaker.allow());
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
    }

    #[test]
    fn test_zero_thresholds_are_clamped() {
        let config = StoreResilienceConfig::default()
            .with_failure_threshold(0)
            .with_half_open_max_calls(0);
        let breaker = CircuitBreaker::new(&config, "test");
        assert_eq!(breaker.failure_threshold, 1);
        assert_eq!(breaker.half_open_max_calls, 1);
    }

    #[test]
    fn test_inner_errors_become_store_unavailable() {
        let store = ResilientStore::new(FlakyStore::new(true), &StoreResilienceConfig::default());
        let err = store.list_objects(&ObjectFilter::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::StoreUnavailable { ref operation, .. } if operation == "list_objects"
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_open_circuit_short_circuits_calls() {
        let config = StoreResilienceConfig::default()
            .with_failure_threshold(2)
            .with_reset_timeout_ms(60_000);
        let store = ResilientStore::new(FlakyStore::new(true), &config);

        for _ in 0..2 {
            assert!(store.list_objects(&ObjectFilter::default()).is_err());
        }
        assert_eq!(store.circuit_state(), 1);

        let err = store.list_objects(&ObjectFilter::default()).unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_success_keeps_circuit_closed() {
        let store = ResilientStore::new(FlakyStore::new(false), &StoreResilienceConfig::default());
        assert!(store.list_objects(&ObjectFilter::default()).unwrap().is_empty());
        assert_eq!(store.circuit_state(), 0);
        assert_eq!(store.name(), "flaky");
    }
}
