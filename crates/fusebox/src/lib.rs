//! # Fusebox
//!
//! Circuit breaking, bounded retry, and fallback coordination for calls to
//! unreliable downstream dependencies: third-party APIs, databases, LLM
//! services, long-lived sockets.
//!
//! ## Components
//!
//! - [`breaker`] — three-state circuit breaker (closed / open / half-open)
//!   with per-call timeouts and failure-kind metrics
//! - [`retry`] — bounded retry with configurable backoff growth and jitter
//! - [`registry`] — one shared breaker instance per dependency name
//! - [`fallback`] — degraded-response handler chain
//! - [`facade`] — [`Resilience`], the composed entry point
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fusebox::Resilience;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resilience = Resilience::default();
//!
//! let response = resilience
//!     .call("inventory-api", || async {
//!         // Call the flaky dependency here.
//!         Ok::<_, std::io::Error>("in stock")
//!     })
//!     .await?;
//!
//! println!("{}", resilience.status("inventory-api").unwrap());
//! # Ok(())
//! # }
//! ```
//!
//! Breakers open after a run of consecutive failures, reject calls while
//! open, and probe recovery through a half-open trial burst. Every retry
//! attempt passes back through the breaker, so retries stop hammering a
//! dependency the moment its circuit opens.

pub mod breaker;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod registry;
pub mod retry;

pub use breaker::{
    BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState,
};
pub use error::{ConfigError, FailureKind, ResilienceError};
pub use facade::Resilience;
pub use fallback::{
    CachedFallback, FallbackChain, FallbackContext, FallbackHandler, StaticFallback,
};
pub use registry::CircuitBreakerRegistry;
pub use retry::{
    BackoffStrategy, JitterType, RetryAttempt, RetryConfig, RetryExecutor, RetryMetrics,
};
