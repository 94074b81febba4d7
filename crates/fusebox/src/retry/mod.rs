//! Retry with Backoff
//!
//! Bounded retry for async operations, with pluggable backoff growth and
//! jitter randomization.
//!
//! # Example
//!
//! ```rust,no_run
//! use fusebox::retry::{BackoffStrategy, JitterType, RetryConfig, RetryExecutor};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::new()
//!     .with_max_attempts(5)
//!     .with_base_delay(Duration::from_millis(200))
//!     .with_backoff_strategy(BackoffStrategy::Exponential)
//!     .with_jitter(JitterType::Full);
//! let executor = RetryExecutor::new(config)?;
//!
//! let response = executor
//!     .execute_with_retry(|| async {
//!         // Call the flaky dependency here.
//!         Ok::<_, std::io::Error>("response")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod executor;

pub use backoff::{BackoffStrategy, JitterType};
pub use executor::{HISTORY_LIMIT, RetryAttempt, RetryConfig, RetryExecutor, RetryMetrics};
