//! Circuit Breaker Call Accounting
//!
//! Counters for admitted, rejected, and timed-out calls, plus per-kind
//! failure tallies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Call statistics for a single circuit breaker.
///
/// The struct lives behind its breaker's lock, so plain fields are enough;
/// a snapshot is a clone taken while the lock is held and is therefore
/// internally consistent. `total_calls` counts only calls that actually ran:
/// `total_calls == successful_calls + failed_calls` holds at all times, with
/// timeouts tallied inside `failed_calls` and again in `timeouts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitMetrics {
    /// Admitted calls that ran to completion, success or failure
    pub total_calls: u64,
    /// Admitted calls that succeeded
    pub successful_calls: u64,
    /// Admitted calls that failed, timeouts included
    pub failed_calls: u64,
    /// Failed calls that missed the per-call deadline
    pub timeouts: u64,
    /// Calls rejected without running because the circuit was open
    pub rejected_calls: u64,
    /// State transitions since creation or the last reset
    pub state_changes: u64,
    /// Last failure, milliseconds since the Unix epoch
    pub last_failure_ms: Option<u64>,
    /// Last success, milliseconds since the Unix epoch
    pub last_success_ms: Option<u64>,
    /// Failure counts keyed by failure-kind label
    pub failure_kinds: HashMap<String, u64>,
}

impl CircuitMetrics {
    /// Create empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of admitted calls that succeeded; 1.0 when nothing ran yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            1.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }

    /// Occurrences of a failure kind.
    pub fn failure_kind_count(&self, kind: &str) -> u64 {
        self.failure_kinds.get(kind).copied().unwrap_or(0)
    }

    pub(crate) fn record_success(&mut self) {
        self.total_calls += 1;
        self.successful_calls += 1;
        self.last_success_ms = Some(epoch_ms());
    }

    pub(crate) fn record_failure(&mut self, kind: &str) {
        self.total_calls += 1;
        self.failed_calls += 1;
        self.last_failure_ms = Some(epoch_ms());
        *self.failure_kinds.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn record_rejected(&mut self) {
        self.rejected_calls += 1;
    }

    pub(crate) fn record_state_change(&mut self) {
        self.state_changes += 1;
    }

    /// Clear every counter.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for CircuitMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Circuit Metrics:")?;
        writeln!(f, "  Total Calls: {}", self.total_calls)?;
        writeln!(f, "  Successes: {}", self.successful_calls)?;
        writeln!(f, "  Failures: {}", self.failed_calls)?;
        writeln!(f, "  Timeouts: {}", self.timeouts)?;
        writeln!(f, "  Rejected: {}", self.rejected_calls)?;
        writeln!(f, "  Success Rate: {:.2}%", self.success_rate() * 100.0)?;
        writeln!(f, "  State Changes: {}", self.state_changes)?;
        if !self.failure_kinds.is_empty() {
            writeln!(f, "  Failure Kinds:")?;
            let mut kinds: Vec<_> = self.failure_kinds.iter().collect();
            kinds.sort_by(|a, b| a.0.cmp(b.0));
            for (kind, count) in kinds {
                writeln!(f, "    {}: {}", kind, count)?;
            }
        }
        Ok(())
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
