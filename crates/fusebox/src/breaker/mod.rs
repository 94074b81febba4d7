//! Circuit Breaker
//!
//! Wraps calls to an unreliable downstream dependency and fails fast once
//! the dependency looks unhealthy, instead of queueing up doomed work.
//!
//! # Example
//!
//! ```rust,no_run
//! use fusebox::breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::new("payments")
//!     .with_failure_threshold(5)
//!     .with_recovery_timeout(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new("payments", config)?;
//!
//! let result = breaker
//!     .execute(|| async {
//!         // Call the flaky dependency here.
//!         Ok::<_, std::io::Error>("response")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod state;

pub use config::CircuitBreakerConfig;
pub use metrics::CircuitMetrics;
pub use state::{BreakerStatus, CircuitBreaker, CircuitState};
