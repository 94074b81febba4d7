//! Fallback Handlers
//!
//! Degraded-response handlers consulted when a guarded call is rejected or
//! exhausts its retries. The breaker itself never invokes fallbacks; the
//! facade (or the caller) does, branching on the failure kind carried in
//! the [`FallbackContext`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{FailureKind, ResilienceError};

/// What a fallback handler gets to decide with.
#[derive(Debug, Clone)]
pub struct FallbackContext {
    /// Name of the dependency whose call failed
    pub dependency: String,
    /// Failure kind label, e.g. `"CircuitOpen"` or `"Timeout"`
    pub failure_kind: String,
    /// Human-readable failure description
    pub message: String,
}

impl FallbackContext {
    /// Build a context from a failed guarded call.
    ///
    /// `failure_kind` is the root cause kind: exhausted retries over an open
    /// circuit read as `"CircuitOpen"`, not `"RetryExhausted"`. The message
    /// keeps the full failure chain.
    pub fn new<E>(dependency: impl Into<String>, failure: &ResilienceError<E>) -> Self
    where
        E: std::error::Error + FailureKind + 'static,
    {
        Self {
            dependency: dependency.into(),
            failure_kind: failure.root().kind().to_string(),
            message: failure.to_string(),
        }
    }
}

/// A single degraded-response strategy.
///
/// Returning `None` passes the decision to the next handler in the chain.
#[async_trait]
pub trait FallbackHandler<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Produce a degraded response, or decline.
    async fn handle(&self, ctx: &FallbackContext) -> Option<T>;

    /// Handler name for logs.
    fn name(&self) -> &str {
        "fallback"
    }
}

/// Ordered chain of fallback handlers; the first `Some` wins.
pub struct FallbackChain<T> {
    handlers: Vec<Arc<dyn FallbackHandler<T>>>,
}

impl<T: Send + 'static> FallbackChain<T> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler. Handlers are consulted in registration order.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: FallbackHandler<T> + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Ask each handler in order; return the first degraded response.
    pub async fn resolve(&self, ctx: &FallbackContext) -> Option<T> {
        for handler in &self.handlers {
            if let Some(value) = handler.handle(ctx).await {
                tracing::info!(
                    dependency = %ctx.dependency,
                    handler = handler.name(),
                    kind = %ctx.failure_kind,
                    "fallback served degraded response"
                );
                return Some(value);
            }
            tracing::debug!(
                dependency = %ctx.dependency,
                handler = handler.name(),
                "fallback handler declined"
            );
        }
        None
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether any handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T: Send + 'static> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Always serves a fixed degraded value.
#[derive(Debug, Clone)]
pub struct StaticFallback<T> {
    value: T,
}

impl<T: Clone + Send + Sync + 'static> StaticFallback<T> {
    /// Create a handler serving `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> FallbackHandler<T> for StaticFallback<T> {
    async fn handle(&self, _ctx: &FallbackContext) -> Option<T> {
        Some(self.value.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Serves the last known-good value recorded by the caller.
///
/// Declines until the first [`record`](Self::record); callers typically
/// record on every successful primary call. Clones share the cache, so one
/// clone can live in a [`FallbackChain`] while the caller records through
/// another.
#[derive(Debug, Clone)]
pub struct CachedFallback<T> {
    cached: Arc<Mutex<Option<T>>>,
}

impl<T: Clone + Send + Sync + 'static> CachedFallback<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Store the latest known-good value.
    pub fn record(&self, value: T) {
        *self.cached.lock() = Some(value);
    }
}

impl<T: Clone + Send + Sync + 'static> Default for CachedFallback<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> FallbackHandler<T> for CachedFallback<T> {
    async fn handle(&self, _ctx: &FallbackContext) -> Option<T> {
        self.cached.lock().clone()
    }

    fn name(&self) -> &str {
        "cached"
    }
}
