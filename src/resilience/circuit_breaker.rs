//! # Circuit Breaker Implementation
//!
//! Fault isolation for the ledger connection. Three states: Closed (normal
//! operation), Open (failing fast) and Half-Open (probing recovery). The
//! breaker never retries anything itself.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::CircuitBreakerConfig;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test peer health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

/// Errors that decide whether they count against the circuit
///
/// A missing key or a chaincode rejection says nothing about peer health;
/// only transport-level failures should trip the breaker.
pub trait TripsBreaker {
    fn trips_breaker(&self) -> bool;
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran and failed
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Call counters for one breaker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub consecutive_failures: u64,
    pub half_open_calls: u64,
}

/// Circuit breaker with atomic state and mutex-protected counters
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    config: CircuitBreakerConfig,
    metrics: Mutex<CircuitBreakerMetrics>,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            open_timeout_ms = config.open_timeout_ms,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: Mutex::new(CircuitBreakerMetrics::default()),
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TripsBreaker,
    {
        if !self.should_allow_call() {
            self.metrics.lock().rejected_count += 1;
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Err(err) if err.trips_breaker() => self.record_failure(duration),
            _ => self.record_success(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    fn should_allow_call(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.opened_at.lock().map(|opened| opened.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed >= self.config.open_timeout() => {
                        self.transition_to_half_open();
                        true
                    }
                    Some(_) => false,
                    None => {
                        warn!(component = %self.name, "Circuit open but no timestamp recorded");
                        true
                    }
                }
            }
            CircuitState::HalfOpen => {
                self.metrics.lock().half_open_calls < u64::from(self.config.success_threshold)
            }
        }
    }

    fn record_success(&self, duration: Duration) {
        let mut metrics = self.metrics.lock();
        metrics.total_calls += 1;
        metrics.success_count += 1;

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "Ledger call passed breaker"
        );

        match self.state() {
            CircuitState::HalfOpen => {
                metrics.half_open_calls += 1;
                if metrics.half_open_calls >= u64::from(self.config.success_threshold) {
                    drop(metrics);
                    self.transition_to_closed();
                }
            }
            CircuitState::Closed => metrics.consecutive_failures = 0,
            CircuitState::Open => {
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    fn record_failure(&self, duration: Duration) {
        let mut metrics = self.metrics.lock();
        metrics.total_calls += 1;
        metrics.failure_count += 1;

        error!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "Ledger call failed at transport level"
        );

        match self.state() {
            CircuitState::Closed => {
                metrics.consecutive_failures += 1;
                if metrics.consecutive_failures >= u64::from(self.config.failure_threshold) {
                    drop(metrics);
                    self.transition_to_open();
                }
            }
            CircuitState::HalfOpen => {
                drop(metrics);
                self.transition_to_open();
            }
            CircuitState::Open => {}
        }
    }

    fn transition_to_closed(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        *self.opened_at.lock() = None;

        let mut metrics = self.metrics.lock();
        metrics.consecutive_failures = 0;
        metrics.half_open_calls = 0;

        info!(component = %self.name, total_calls = metrics.total_calls, "Circuit breaker closed");
    }

    fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.opened_at.lock() = Some(Instant::now());

        let mut metrics = self.metrics.lock();
        metrics.half_open_calls = 0;

        error!(
            component = %self.name,
            consecutive_failures = metrics.consecutive_failures,
            open_timeout_ms = self.config.open_timeout_ms,
            "Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        self.metrics.lock().half_open_calls = 0;

        info!(component = %self.name, "Circuit breaker half-open (probing ledger)");
    }

    /// Force circuit to open state
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        self.transition_to_open();
    }

    /// Force circuit to closed state
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        self.transition_to_closed();
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.metrics.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[derive(Debug)]
    struct Failure(bool);

    impl TripsBreaker for Failure {
        fn trips_breaker(&self) -> bool {
            self.0
        }
    }

    fn config(
        failure_threshold: u32,
        open_timeout_ms: u64,
        success_threshold: u32,
    ) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold,
            open_timeout_ms,
            success_threshold,
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let circuit = CircuitBreaker::new("ledger", config(3, 100, 2));
        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, Failure>("ok") }).await;
        assert!(result.is_ok());

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.success_count, 1);
    }

    #[tokio::test]
    async fn test_opens_on_transport_failures_only() {
        let circuit = CircuitBreaker::new("ledger", config(2, 100, 1));

        // business failures never trip the breaker
        for _ in 0..5 {
            let _ = circuit.call(|| async { Err::<(), _>(Failure(false)) }).await;
        }
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<(), _>(Failure(true)) }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
        let _ = circuit.call(|| async { Err::<(), _>(Failure(true)) }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let result = circuit.call(|| async { Ok::<_, Failure>("not executed") }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen { .. })));
        assert_eq!(circuit.metrics().rejected_count, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_open_timeout() {
        let circuit = CircuitBreaker::new("ledger", config(1, 50, 1));

        let _ = circuit.call(|| async { Err::<(), _>(Failure(true)) }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        let result = circuit.call(|| async { Ok::<_, Failure>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_force_operations() {
        let circuit = CircuitBreaker::new("ledger", config(1, 1_000, 1));
        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }
}
