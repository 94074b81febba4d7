//! Backoff and Jitter Strategies
//!
//! Pure delay arithmetic for the retry executor. Strategies compute a
//! deterministic delay from the attempt number; jitter then randomizes it
//! to keep a fleet of retrying clients from hammering a recovering
//! dependency in lockstep.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the base delay grows across attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay for every attempt
    Fixed,
    /// Delay grows linearly with the attempt number
    Linear,
    /// Delay grows by `multiplier` per attempt
    Exponential,
    /// Exponential growth, intended for use with a randomizing jitter
    JitteredExponential,
}

impl BackoffStrategy {
    /// Delay before the retry following failed attempt `attempt` (1-indexed),
    /// before clamping and jitter. Growth saturates at `Duration::MAX`, so a
    /// high attempt number over a large multiplier cannot overflow.
    pub fn delay(&self, base: Duration, multiplier: f64, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base.saturating_mul(attempt),
            BackoffStrategy::Exponential | BackoffStrategy::JitteredExponential => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let factor = multiplier.powi(exponent);
                Duration::try_from_secs_f64(base.as_secs_f64() * factor)
                    .unwrap_or(Duration::MAX)
            }
        }
    }
}

impl std::fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffStrategy::Fixed => write!(f, "fixed"),
            BackoffStrategy::Linear => write!(f, "linear"),
            BackoffStrategy::Exponential => write!(f, "exponential"),
            BackoffStrategy::JitteredExponential => write!(f, "jittered_exponential"),
        }
    }
}

/// Randomization applied to a computed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterType {
    /// Use the computed delay as-is
    None,
    /// Uniform random in `[0, delay]`
    Full,
    /// Half the delay kept, the other half randomized
    Equal,
    /// Uniform random in `[base, previous * 3]`, ignoring the computed delay
    Decorrelated,
}

impl JitterType {
    /// Apply jitter to an already-clamped `delay`.
    ///
    /// `previous` is the delay actually slept before the last retry, seeded
    /// with the base delay before the first retry; only `Decorrelated` reads
    /// it.
    pub fn apply(&self, delay: Duration, base: Duration, previous: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        match self {
            JitterType::None => delay,
            JitterType::Full => {
                Duration::from_secs_f64(rng.gen_range(0.0..=delay.as_secs_f64()))
            }
            JitterType::Equal => {
                let half = delay.as_secs_f64() / 2.0;
                Duration::from_secs_f64(half + rng.gen_range(0.0..=half))
            }
            JitterType::Decorrelated => {
                let low = base.as_secs_f64();
                let high = (previous.as_secs_f64() * 3.0).max(low);
                Duration::from_secs_f64(rng.gen_range(low..=high))
            }
        }
    }
}

impl std::fmt::Display for JitterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitterType::None => write!(f, "none"),
            JitterType::Full => write!(f, "full"),
            JitterType::Equal => write!(f, "equal"),
            JitterType::Decorrelated => write!(f, "decorrelated"),
        }
    }
}
