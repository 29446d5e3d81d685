//! Consecutive-failure bookkeeping shared between the breaker and the
//! state machine guards

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Thread-safe tally of consecutive failures
///
/// Tracks the run of failures since the last success or reset, plus the
/// monotonic timestamp of the most recent failure (0.0 before any
/// failure has been recorded). The breaker writes it under its call
/// lock; the state machine guards read it through the shared context.
#[derive(Debug, Default)]
pub struct FailureTally {
    consecutive: AtomicUsize,
    /// f64 bit pattern of the last failure time in monotonic seconds
    last_failure_bits: AtomicU64,
}

impl FailureTally {
    /// Create an empty tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `at` monotonic seconds, returning the new
    /// consecutive count
    pub fn record_failure(&self, at: f64) -> usize {
        self.last_failure_bits.store(at.to_bits(), Ordering::Release);
        self.consecutive.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a success, resetting the consecutive run to zero
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Release);
    }

    /// Reset the consecutive run (used on every transition out of Open)
    pub fn reset(&self) {
        self.consecutive.store(0, Ordering::Release);
    }

    /// Current consecutive failure count
    pub fn failures(&self) -> usize {
        self.consecutive.load(Ordering::Acquire)
    }

    /// Monotonic time of the most recent failure, 0.0 if none
    pub fn last_failure_at(&self) -> f64 {
        f64::from_bits(self.last_failure_bits.load(Ordering::Acquire))
    }
}
