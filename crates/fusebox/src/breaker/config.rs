//! Circuit Breaker Configuration
//!
//! Immutable per-breaker settings, validated before a breaker is built.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Name/identifier for this circuit breaker
    pub name: String,
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe call is allowed
    pub recovery_timeout: Duration,
    /// Maximum number of concurrent probe calls in the half-open state
    pub half_open_max_calls: u32,
    /// Per-call execution deadline enforced by the breaker
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the half-open max calls
    pub fn with_half_open_max_calls(mut self, max: u32) -> Self {
        self.half_open_max_calls = max;
        self
    }

    /// Set the per-call deadline
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Create a strict configuration (opens quickly, probes carefully)
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(10),
            half_open_max_calls: 1,
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Create a lenient configuration (tolerates many failures)
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 5,
            call_timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Check every numeric field is positive.
    ///
    /// A bad field fails construction outright; values are never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::new("failure_threshold", "must be positive"));
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::new("recovery_timeout", "must be positive"));
        }
        if self.half_open_max_calls == 0 {
            return Err(ConfigError::new("half_open_max_calls", "must be positive"));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::new("call_timeout", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.half_open_max_calls, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = CircuitBreakerConfig::new("payments")
            .with_failure_threshold(2)
            .with_recovery_timeout(Duration::from_millis(200))
            .with_half_open_max_calls(1)
            .with_call_timeout(Duration::from_secs(1));

        assert_eq!(config.name, "payments");
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout, Duration::from_millis(200));
        assert_eq!(config.half_open_max_calls, 1);
    }

    #[test]
    fn test_strict_config() {
        let config = CircuitBreakerConfig::strict();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.recovery_timeout.as_secs(), 10);
        assert_eq!(config.half_open_max_calls, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lenient_config() {
        let config = CircuitBreakerConfig::lenient();
        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.recovery_timeout.as_secs(), 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let config = CircuitBreakerConfig::new("bad").with_failure_threshold(0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "failure_threshold");
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = CircuitBreakerConfig::new("bad").with_recovery_timeout(Duration::ZERO);
        assert_eq!(config.validate().unwrap_err().field, "recovery_timeout");

        let config = CircuitBreakerConfig::new("bad").with_call_timeout(Duration::ZERO);
        assert_eq!(config.validate().unwrap_err().field, "call_timeout");
    }

    #[test]
    fn test_zero_half_open_max_calls_rejected() {
        let config = CircuitBreakerConfig::new("bad").with_half_open_max_calls(0);
        assert_eq!(config.validate().unwrap_err().field, "half_open_max_calls");
    }

    #[test]
    fn test_serde_round_trip() {
        let config = CircuitBreakerConfig::new("search").with_failure_threshold(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: CircuitBreakerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "search");
        assert_eq!(back.failure_threshold, 7);
    }
}
