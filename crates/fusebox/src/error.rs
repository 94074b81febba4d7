//! Error taxonomy for guarded calls.
//!
//! Every guarded call resolves to the operation's value or to one variant of
//! [`ResilienceError`]; configuration problems surface separately as
//! [`ConfigError`] before any call can be made.

use std::time::Duration;

use thiserror::Error;

/// Classifies operation errors into short labels used for metrics buckets
/// and retry allow-lists.
///
/// The default implementation derives the label from the error's type name,
/// which is usually enough to tell failure classes apart on a dashboard.
/// Implement [`kind`](FailureKind::kind) by hand when finer classes matter,
/// e.g. splitting rate-limit responses from hard connection errors.
pub trait FailureKind {
    /// Short label for this failure class.
    fn kind(&self) -> &str {
        let name = std::any::type_name::<Self>();
        let name = name.split('<').next().unwrap_or(name);
        name.rsplit("::").next().unwrap_or(name)
    }
}

impl FailureKind for std::io::Error {
    fn kind(&self) -> &str {
        "Io"
    }
}

/// Invalid configuration detected at construction time.
///
/// Construction never clamps: a bad field is reported, not corrected. This is
/// the only error that is not part of the runtime call path.
#[derive(Debug, Clone, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    /// The offending field.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors produced by guarded calls.
///
/// `Operation` carries the wrapped operation's own error verbatim so callers
/// can inspect the original cause; the remaining variants are produced by the
/// breaker and retry layers themselves. The variants are what fallback chains
/// and retry allow-lists branch on.
#[derive(Debug)]
pub enum ResilienceError<E: std::error::Error + 'static> {
    /// The circuit was open and the call was rejected without running.
    CircuitOpen {
        /// Name of the breaker that rejected the call.
        name: String,
    },
    /// The operation missed the breaker's per-call deadline.
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
    /// Every allowed retry attempt was spent.
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The failure recorded on the final attempt.
        last: Box<ResilienceError<E>>,
    },
    /// The operation itself failed.
    Operation(E),
}

impl<E: std::error::Error + 'static> ResilienceError<E> {
    /// True when the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// True when the call missed its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The operation's own error, if that is what failed.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Recover the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Result<E, Self> {
        match self {
            Self::Operation(e) => Ok(e),
            other => Err(other),
        }
    }

    /// The root failure, unwrapping any `RetryExhausted` layers.
    ///
    /// Fallback handlers branch on this so an exhausted retry over an open
    /// circuit still reads as `"CircuitOpen"`.
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::RetryExhausted { last, .. } = current {
            current = last.as_ref();
        }
        current
    }
}

impl<E: std::error::Error + 'static> std::fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitOpen { name } => {
                write!(f, "circuit breaker '{}' is open", name)
            }
            Self::Timeout { timeout } => {
                write!(f, "operation timed out after {:?}", timeout)
            }
            Self::RetryExhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
            Self::Operation(error) => write!(f, "{}", error),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Timeout { .. } => None,
            Self::RetryExhausted { last, .. } => Some(last.as_ref() as _),
            Self::Operation(error) => Some(error as _),
        }
    }
}

impl<E: std::error::Error + FailureKind + 'static> FailureKind for ResilienceError<E> {
    fn kind(&self) -> &str {
        match self {
            Self::CircuitOpen { .. } => "CircuitOpen",
            Self::Timeout { .. } => "Timeout",
            Self::RetryExhausted { .. } => "RetryExhausted",
            Self::Operation(error) => error.kind(),
        }
    }
}
