//! Circuit Breaker Registry
//!
//! Process-wide collection of named circuit breakers. Every caller asking
//! for a given name sees the same breaker instance, so failure history for
//! a dependency is shared across the codebase instead of fragmenting into
//! per-call-site breakers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use crate::error::ConfigError;

/// Registry of circuit breakers keyed by name.
///
/// Lookup and creation happen in a single critical section, so two tasks
/// racing to create the same breaker always end up sharing one instance.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the breaker for `name`, creating it if absent.
    ///
    /// `config` applies only when the breaker is created here. If the name
    /// already exists the existing breaker is returned unchanged and the
    /// provided config is ignored.
    pub fn get_or_create(
        &self,
        name: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        let mut breakers = self.breakers.lock();
        if let Some(existing) = breakers.get(name) {
            if config.is_some() {
                tracing::debug!(
                    circuit = name,
                    "breaker already registered, ignoring provided config"
                );
            }
            return Ok(Arc::clone(existing));
        }
        let breaker = match config {
            Some(config) => CircuitBreaker::new(name, config)?,
            None => CircuitBreaker::with_default(name),
        };
        tracing::debug!(circuit = name, "registered circuit breaker");
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        Ok(breaker)
    }

    /// Get the breaker for `name`, creating it with defaults if absent.
    ///
    /// Default configuration always validates, so this path cannot fail.
    pub fn get_or_default(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        if let Some(existing) = breakers.get(name) {
            return Arc::clone(existing);
        }
        let breaker = CircuitBreaker::with_default(name);
        tracing::debug!(circuit = name, "registered circuit breaker");
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Get an existing breaker without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().get(name).map(Arc::clone)
    }

    /// Names of all registered breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Status snapshots for every registered breaker, sorted by name.
    pub fn statuses(&self) -> Vec<BreakerStatus> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.lock().values().map(Arc::clone).collect();
        let mut statuses: Vec<BreakerStatus> =
            breakers.iter().map(|breaker| breaker.status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.breakers.lock().is_empty()
    }

    /// Reset the metrics of every registered breaker.
    pub fn reset_all_metrics(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.lock().values().map(Arc::clone).collect();
        for breaker in breakers {
            breaker.reset_metrics();
        }
    }
}
