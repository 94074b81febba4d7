//! Retry Executor
//!
//! Bounded retry of an async operation with configurable backoff and
//! jitter. Independent of the circuit breaker; the resilience facade
//! composes the two so that every retry attempt passes back through the
//! breaker's admission check.

use std::future::Future;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time;

use super::backoff::{BackoffStrategy, JitterType};
use crate::error::{ConfigError, FailureKind, ResilienceError};

/// Number of per-attempt records kept in [`RetryMetrics::attempt_history`].
pub const HISTORY_LIMIT: usize = 100;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call (must be at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry, and the growth unit for backoff
    pub base_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    /// How the delay grows across attempts
    pub backoff_strategy: BackoffStrategy,
    /// Randomization applied to the computed delay
    pub jitter: JitterType,
    /// Growth factor for exponential strategies
    pub multiplier: f64,
    /// Failure kinds worth retrying; `None` retries on any failure
    pub retryable_kinds: Option<Vec<String>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter: JitterType::Equal,
            multiplier: 2.0,
            retryable_kinds: None,
        }
    }
}

impl RetryConfig {
    /// Create with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Set the jitter type.
    pub fn with_jitter(mut self, jitter: JitterType) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the exponential growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Restrict retries to the given failure kinds.
    pub fn with_retryable_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_kinds = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Preset for database calls: quick, tightly bounded retries.
    pub fn database() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter: JitterType::Equal,
            multiplier: 2.0,
            retryable_kinds: None,
        }
    }

    /// Preset for third-party HTTP APIs: patient backoff with full jitter.
    pub fn external_api() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter: JitterType::Full,
            multiplier: 2.0,
            retryable_kinds: None,
        }
    }

    /// Preset for LLM completions: few attempts, long ceiling.
    pub fn llm() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_strategy: BackoffStrategy::JitteredExponential,
            jitter: JitterType::Full,
            multiplier: 2.0,
            retryable_kinds: None,
        }
    }

    /// Preset for long-lived socket reconnects: many attempts, decorrelated
    /// delays so a disconnected fleet does not reconnect in waves.
    pub fn websocket() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter: JitterType::Decorrelated,
            multiplier: 2.0,
            retryable_kinds: None,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::new("max_attempts", "must be positive"));
        }
        if self.base_delay.is_zero() {
            return Err(ConfigError::new("base_delay", "must be positive"));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::new("max_delay", "must be at least base_delay"));
        }
        if !(self.multiplier > 0.0) {
            return Err(ConfigError::new("multiplier", "must be positive"));
        }
        Ok(())
    }

    /// Delay before the retry that follows failed attempt `attempt`
    /// (1-indexed). `previous` is the delay actually slept last time, seeded
    /// with `base_delay`. The strategy delay is clamped to `max_delay` before
    /// jitter, and the jittered result is clamped again so decorrelated
    /// jitter cannot exceed the ceiling.
    pub fn delay_for(&self, attempt: u32, previous: Duration) -> Duration {
        let planned = self
            .backoff_strategy
            .delay(self.base_delay, self.multiplier, attempt)
            .min(self.max_delay);
        self.jitter
            .apply(planned, self.base_delay, previous)
            .min(self.max_delay)
    }

    /// Whether a failure of `kind` should be retried.
    pub fn is_retryable(&self, kind: &str) -> bool {
        match &self.retryable_kinds {
            Some(kinds) => kinds.iter().any(|k| k == kind),
            None => true,
        }
    }
}

/// One recorded retry: written when a retry is taken, before its delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// The failed attempt (1-indexed) that triggered this retry
    pub attempt: u32,
    /// Delay slept before the next attempt
    pub delay: Duration,
    /// Kind label of the failure that triggered the retry
    pub failure_kind: String,
    /// Milliseconds since the Unix epoch when the retry was scheduled
    pub at_ms: u64,
    /// Time since the first attempt started
    pub elapsed_since_start: Duration,
}

/// Aggregated retry counters for one executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryMetrics {
    /// Every attempt made, first calls included
    pub total_attempts: u64,
    /// Operations that succeeded after at least one retry
    pub successful_retries: u64,
    /// Operations that exhausted their attempt budget
    pub failed_retries: u64,
    /// Sum of all backoff delays slept
    pub total_delay: Duration,
    /// Most recent retries, capped at [`HISTORY_LIMIT`]
    pub attempt_history: Vec<RetryAttempt>,
}

impl RetryMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&mut self, attempt: RetryAttempt) {
        if self.attempt_history.len() >= HISTORY_LIMIT {
            self.attempt_history.remove(0);
        }
        self.attempt_history.push(attempt);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Executes operations with bounded retry and backoff.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Mutex<RetryMetrics>,
}

impl RetryExecutor {
    /// Create a new executor, validating the configuration first.
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Mutex::new(RetryMetrics::new()),
        })
    }

    /// Create with default configuration.
    pub fn with_default() -> Self {
        Self {
            config: RetryConfig::default(),
            metrics: Mutex::new(RetryMetrics::new()),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Snapshot of the retry counters.
    pub fn metrics(&self) -> RetryMetrics {
        self.metrics.lock().clone()
    }

    /// Clear the retry counters.
    pub fn reset_metrics(&self) {
        self.metrics.lock().reset();
    }

    /// Run `operation` with up to `max_attempts` attempts.
    ///
    /// A failure on the final attempt yields
    /// [`ResilienceError::RetryExhausted`] carrying the attempt count and the
    /// last failure; exhaustion takes precedence over the retryable-kind
    /// check. On a non-final attempt, a failure kind outside
    /// `retryable_kinds` propagates verbatim without burning the remaining
    /// budget.
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + FailureKind + 'static,
    {
        self.run(|| async { operation().await.map_err(ResilienceError::Operation) })
            .await
    }

    /// Attempt loop over an operation that already yields taxonomy errors.
    ///
    /// The facade routes breaker-guarded calls through here so circuit
    /// rejections and timeouts hit the same retryable-kind check as plain
    /// operation failures, without double-wrapping.
    pub(crate) async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        E: std::error::Error + FailureKind + 'static,
    {
        let started = Instant::now();
        let mut previous_delay = self.config.base_delay;
        let mut attempt: u32 = 1;

        loop {
            self.metrics.lock().total_attempts += 1;

            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.metrics.lock().successful_retries += 1;
                        tracing::debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let kind = failure.kind().to_string();
            if attempt >= self.config.max_attempts {
                self.metrics.lock().failed_retries += 1;
                tracing::warn!(attempts = attempt, kind = %kind, "retries exhausted");
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }
            if !self.config.is_retryable(&kind) {
                tracing::debug!(attempt, kind = %kind, "failure kind not retryable");
                return Err(failure);
            }

            let delay = self.config.delay_for(attempt, previous_delay);
            {
                let mut metrics = self.metrics.lock();
                metrics.total_delay += delay;
                metrics.record_attempt(RetryAttempt {
                    attempt,
                    delay,
                    failure_kind: kind.clone(),
                    at_ms: epoch_ms(),
                    elapsed_since_start: started.elapsed(),
                });
            }
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %kind,
                "retrying after backoff"
            );
            time::sleep(delay).await;
            previous_delay = delay;
            attempt += 1;
        }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
