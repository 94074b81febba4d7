//! Fusebox Testing Utilities
//!
//! Scripted unreliable dependencies and assertion helpers for driving
//! breakers, retries, and fallbacks in tests without live downstream calls.

pub mod flaky;

pub use flaky::{FlakyService, ServiceError};

/// Assert a breaker's current state.
#[macro_export]
macro_rules! assert_breaker_state {
    ($breaker:expr, $state:expr) => {
        assert_eq!(
            $breaker.state(),
            $state,
            "circuit '{}' not in expected state",
            $breaker.name()
        )
    };
}
