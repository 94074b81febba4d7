//! Scripted flaky dependency for resilience tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fusebox::FailureKind;
use thiserror::Error;

/// Failure kinds the scripted service can produce.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service unavailable")]
    Unavailable,
    #[error("rate limited")]
    RateLimited,
}

impl FailureKind for ServiceError {
    fn kind(&self) -> &str {
        match self {
            ServiceError::Unavailable => "Unavailable",
            ServiceError::RateLimited => "RateLimited",
        }
    }
}

/// A mock downstream dependency with a scripted failure pattern.
///
/// Clones share the call counter, so a test can hold one handle while the
/// guarded operation calls through another.
#[derive(Clone)]
pub struct FlakyService {
    /// Calls that fail before the service starts succeeding
    fail_first: usize,
    /// Artificial per-call latency
    latency: Duration,
    /// Error returned while failing
    failure: ServiceError,
    /// Response returned once healthy
    response: String,
    calls: Arc<AtomicUsize>,
}

impl FlakyService {
    /// A service that always succeeds.
    pub fn reliable() -> Self {
        Self::failing_first(0)
    }

    /// A service whose first `n` calls fail, succeeding afterwards.
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            latency: Duration::ZERO,
            failure: ServiceError::Unavailable,
            response: "ok".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A service that never succeeds.
    pub fn broken() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Add artificial latency to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the error returned while failing.
    pub fn with_failure(mut self, failure: ServiceError) -> Self {
        self.failure = failure;
        self
    }

    /// Set the response returned once healthy.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// One scripted call.
    pub async fn call(&self) -> Result<String, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if n <= self.fail_first {
            Err(self.failure.clone())
        } else {
            Ok(self.response.clone())
        }
    }

    /// How many times the service has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
