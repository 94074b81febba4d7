//! Resilience Facade
//!
//! One entry point composing the registry, circuit breakers, retry, and
//! fallback: `call` looks up (or creates) the named breaker, then runs the
//! operation through the retry executor with every attempt individually
//! guarded by the breaker. Retry wraps the breaker, so a circuit that opens
//! mid-sequence turns the remaining attempts into fast rejections, and the
//! retryable-kind allow-list can stop retrying those.
//!
//! # Example
//!
//! ```rust,no_run
//! use fusebox::Resilience;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resilience = Resilience::default();
//!
//! let response = resilience
//!     .call("payments", || async {
//!         // Call the flaky dependency here.
//!         Ok::<_, std::io::Error>("response")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{ConfigError, FailureKind, ResilienceError};
use crate::fallback::{FallbackChain, FallbackContext};
use crate::registry::CircuitBreakerRegistry;
use crate::retry::{RetryConfig, RetryExecutor, RetryMetrics};

/// Composed resilience entry point: registry + breakers + retry + fallback.
///
/// Construct once at application start and share by reference (or `Arc`);
/// breakers live in the registry for the life of the process.
#[derive(Debug)]
pub struct Resilience {
    registry: Arc<CircuitBreakerRegistry>,
    retry: RetryExecutor,
}

impl Resilience {
    /// Create with a fresh registry and the given retry configuration.
    pub fn new(retry_config: RetryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: Arc::new(CircuitBreakerRegistry::new()),
            retry: RetryExecutor::new(retry_config)?,
        })
    }

    /// Create over an existing (possibly shared) registry.
    pub fn with_registry(
        registry: Arc<CircuitBreakerRegistry>,
        retry_config: RetryConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            registry,
            retry: RetryExecutor::new(retry_config)?,
        })
    }

    /// Register the breaker for `name` with an explicit configuration.
    ///
    /// Configuration applies only if the breaker does not exist yet; see
    /// [`CircuitBreakerRegistry::get_or_create`]. Calls to
    /// [`call`](Self::call) for names never configured here get default
    /// breakers.
    pub fn configure(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        self.registry.get_or_create(name, Some(config))
    }

    /// Run `operation` against the named dependency with breaker + retry.
    ///
    /// The operation closure is invoked once per attempt. Failure order on
    /// exhaustion: the returned [`ResilienceError::RetryExhausted`] carries
    /// whatever the final attempt produced, which may itself be a rejection
    /// or timeout.
    pub async fn call<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + FailureKind + 'static,
    {
        let breaker = self.registry.get_or_default(name);
        self.retry
            .run(|| {
                let breaker = Arc::clone(&breaker);
                let operation = &operation;
                async move { breaker.execute(operation).await }
            })
            .await
    }

    /// Like [`call`](Self::call), consulting `fallback` when the guarded
    /// call ultimately fails. The original failure is returned only if every
    /// handler declines.
    pub async fn call_with_fallback<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
        fallback: &FallbackChain<T>,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Send + 'static,
        E: std::error::Error + FailureKind + 'static,
    {
        match self.call(name, operation).await {
            Ok(value) => Ok(value),
            Err(failure) => {
                let ctx = FallbackContext::new(name, &failure);
                match fallback.resolve(&ctx).await {
                    Some(value) => Ok(value),
                    None => Err(failure),
                }
            }
        }
    }

    /// Status of one breaker, if it exists.
    pub fn status(&self, name: &str) -> Option<BreakerStatus> {
        self.registry.get(name).map(|breaker| breaker.status())
    }

    /// Status snapshots of all registered breakers, sorted by name.
    pub fn all_statuses(&self) -> Vec<BreakerStatus> {
        self.registry.statuses()
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Snapshot of the retry counters, aggregated across all dependencies.
    pub fn retry_metrics(&self) -> RetryMetrics {
        self.retry.metrics()
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self {
            registry: Arc::new(CircuitBreakerRegistry::new()),
            retry: RetryExecutor::with_default(),
        }
    }
}
