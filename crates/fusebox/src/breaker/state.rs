//! Circuit Breaker State Machine
//!
//! Implements the core circuit breaker state machine with three states:
//! - Closed: normal operation, calls are admitted
//! - Open: failing fast, calls are rejected
//! - HalfOpen: probing recovery with a bounded trial burst

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time;

use super::config::CircuitBreakerConfig;
use super::metrics::CircuitMetrics;
use crate::error::{ConfigError, FailureKind, ResilienceError};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls are admitted
    Closed,
    /// Circuit is open - calls are rejected
    Open,
    /// Testing recovery - limited probe calls admitted
    HalfOpen,
}

impl CircuitState {
    /// Operator-facing health label for dashboards.
    pub fn health_label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "recovering",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of a breaker, taken under its lock.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    /// Breaker name
    pub name: String,
    /// State at snapshot time
    pub state: CircuitState,
    /// Health label derived from the state
    pub health: &'static str,
    /// Failures recorded since the last success or reset
    pub consecutive_failures: u32,
    /// `successful_calls / total_calls`, 1.0 when nothing ran yet
    pub success_rate: f64,
    /// Active configuration
    pub config: CircuitBreakerConfig,
    /// Counter snapshot
    pub metrics: CircuitMetrics,
}

impl std::fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "circuit '{}' state={} health={} consecutive_failures={} success_rate={:.2}%",
            self.name,
            self.state,
            self.health,
            self.consecutive_failures,
            self.success_rate * 100.0,
        )
    }
}

/// Mutable breaker fields, all guarded by one lock.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    half_open_in_flight: u32,
    metrics: CircuitMetrics,
}

/// Circuit breaker for one named downstream dependency.
///
/// All mutable state sits behind a single mutex so admission decisions,
/// outcome accounting, and transitions are linearized per breaker. The lock
/// is held only for bookkeeping; the guarded operation always runs outside
/// it, so a slow downstream call never blocks other callers' admission
/// checks or status reads.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration, read-only after construction
    config: CircuitBreakerConfig,
    /// State, counters, and metrics under one lock
    inner: Mutex<BreakerInner>,
}

/// Releases a half-open admission slot when its probe finishes.
///
/// Dropping the guard without an explicit release (the caller dropped the
/// `execute` future mid-flight) still gives the slot back, so abandoned
/// probes cannot lock later ones out.
struct HalfOpenPermit<'a> {
    breaker: &'a CircuitBreaker,
    released: bool,
}

impl HalfOpenPermit<'_> {
    fn release(mut self, inner: &mut BreakerInner) {
        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        self.released = true;
    }
}

impl Drop for HalfOpenPermit<'_> {
    fn drop(&mut self) {
        if !self.released {
            let mut inner = self.breaker.inner.lock();
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker, validating the configuration first.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        let mut config = config;
        config.name = name.into();
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create with default configuration.
    pub fn with_default(name: impl Into<String>) -> Arc<Self> {
        Self::build(CircuitBreakerConfig::new(name))
    }

    fn build(config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                half_open_in_flight: 0,
                metrics: CircuitMetrics::new(),
            }),
        })
    }

    /// Check whether a call would currently be admitted.
    ///
    /// In `Open`, an elapsed recovery timeout moves the breaker to `HalfOpen`
    /// as part of the check; evaluation and transition happen under one lock
    /// acquisition so concurrent callers cannot both claim the transition.
    /// In `HalfOpen`, admission is bounded by `half_open_max_calls`.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        self.evaluate_admission(&mut inner)
    }

    /// Run `operation` under the breaker's protection.
    ///
    /// A rejected call fails with [`ResilienceError::CircuitOpen`] without
    /// running the operation. An admitted call runs outside the lock under
    /// the configured per-call deadline; its outcome is recorded against the
    /// state current at completion time, so a probe finishing after the
    /// circuit has already reopened still counts in the metrics but cannot
    /// close the circuit.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + FailureKind + 'static,
    {
        let permit = {
            let mut inner = self.inner.lock();
            if !self.evaluate_admission(&mut inner) {
                inner.metrics.record_rejected();
                tracing::debug!(circuit = %self.config.name, "call rejected, circuit open");
                return Err(ResilienceError::CircuitOpen {
                    name: self.config.name.clone(),
                });
            }
            if inner.state == CircuitState::HalfOpen {
                inner.half_open_in_flight += 1;
                Some(HalfOpenPermit {
                    breaker: self,
                    released: false,
                })
            } else {
                None
            }
        };

        let result = time::timeout(self.config.call_timeout, operation()).await;

        let mut inner = self.inner.lock();
        if let Some(permit) = permit {
            permit.release(&mut inner);
        }
        match result {
            Ok(Ok(value)) => {
                self.on_success(&mut inner);
                Ok(value)
            }
            Ok(Err(error)) => {
                self.on_failure(&mut inner, error.kind());
                Err(ResilienceError::Operation(error))
            }
            Err(_elapsed) => {
                self.on_timeout(&mut inner);
                Err(ResilienceError::Timeout {
                    timeout: self.config.call_timeout,
                })
            }
        }
    }

    /// Record a success observed outside [`execute`](Self::execute).
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.on_success(&mut inner);
    }

    /// Record a failure observed outside [`execute`](Self::execute).
    pub fn record_failure(&self, kind: &str) {
        let mut inner = self.inner.lock();
        self.on_failure(&mut inner, kind);
    }

    /// Record a missed deadline observed outside [`execute`](Self::execute).
    pub fn record_timeout(&self) {
        let mut inner = self.inner.lock();
        self.on_timeout(&mut inner);
    }

    /// Current state. Pure read: recovery eligibility is only evaluated when
    /// a call is attempted.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of the metrics counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.inner.lock().metrics.clone()
    }

    /// Point-in-time status for observability. Pure read, like
    /// [`state`](Self::state).
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus {
            name: self.config.name.clone(),
            state: inner.state,
            health: inner.state.health_label(),
            consecutive_failures: inner.consecutive_failures,
            success_rate: inner.metrics.success_rate(),
            config: self.config.clone(),
            metrics: inner.metrics.clone(),
        }
    }

    /// Clear the metrics counters. State and failure tracking are untouched;
    /// an open circuit stays open.
    pub fn reset_metrics(&self) {
        self.inner.lock().metrics.reset();
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    fn evaluate_admission(&self, inner: &mut BreakerInner) -> bool {
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = inner
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    self.transition(inner, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => inner.half_open_in_flight < self.config.half_open_max_calls,
        }
    }

    fn on_success(&self, inner: &mut BreakerInner) {
        inner.metrics.record_success();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.transition(inner, CircuitState::Closed);
            }
            CircuitState::Open => {
                // Late probe result after the circuit reopened; counted above,
                // but only a success in HalfOpen may close the circuit.
            }
        }
    }

    fn on_failure(&self, inner: &mut BreakerInner, kind: &str) {
        inner.metrics.record_failure(kind);
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures += 1;
                // A single probe failure reopens regardless of the threshold.
                self.transition(inner, CircuitState::Open);
            }
            CircuitState::Open => {
                // Late probe failure; already open, nothing to transition.
            }
        }
    }

    fn on_timeout(&self, inner: &mut BreakerInner) {
        inner.metrics.timeouts += 1;
        self.on_failure(inner, "Timeout");
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.metrics.record_state_change();

        match to {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.last_failure_at = None;
                inner.half_open_in_flight = 0;
                tracing::info!(circuit = %self.config.name, from = %from, "circuit closed");
            }
            CircuitState::Open => {
                tracing::warn!(
                    circuit = %self.config.name,
                    from = %from,
                    consecutive_failures = inner.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "circuit opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = 0;
                tracing::info!(circuit = %self.config.name, "circuit half-open, probing recovery");
            }
        }
    }
}
