//! Time sources for the circuit breaker
//!
//! All breaker timing is expressed as monotonic seconds from a fixed
//! anchor, never wall-clock time, so NTP adjustments cannot shorten or
//! stretch a cool-off window.

use std::sync::Mutex;
use std::time::Instant;

/// Abstract monotonic time source
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Seconds elapsed since the clock's anchor point
    fn monotonic_time(&self) -> f64;
}

/// Default clock anchored to an `Instant` taken at creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start_time: Instant,
}

impl MonotonicClock {
    /// Create a clock anchored to now
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic timing tests
///
/// Time only moves when `advance` or `set` is called, which makes
/// cool-off boundary assertions exact instead of sleep-based.
///
/// # Example
///
/// ```rust
/// use fusebox::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// assert_eq!(clock.monotonic_time(), 0.0);
///
/// clock.advance(5.0);
/// assert_eq!(clock.monotonic_time(), 5.0);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    /// Create a manual clock starting at time 0.0
    pub fn new() -> Self {
        Self {
            now: Mutex::new(0.0),
        }
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        let mut now = self.now.lock().unwrap();
        *now += seconds;
    }

    /// Set the clock to an absolute time in seconds
    pub fn set(&self, seconds: f64) {
        let mut now = self.now.lock().unwrap();
        *now = seconds;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic_time(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();

        let time1 = clock.monotonic_time();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = clock.monotonic_time();

        assert!(time2 > time1);
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new();
        assert_eq!(clock.monotonic_time(), 0.0);

        clock.advance(1.5);
        clock.advance(0.5);
        assert_eq!(clock.monotonic_time(), 2.0);

        clock.set(10.0);
        assert_eq!(clock.monotonic_time(), 10.0);
    }

    #[test]
    fn test_manual_clock_is_shareable() {
        use std::sync::Arc;

        let clock = Arc::new(ManualClock::new());
        let clock_clone = Arc::clone(&clock);

        let handle = std::thread::spawn(move || {
            clock_clone.advance(3.0);
        });
        handle.join().unwrap();

        assert_eq!(clock.monotonic_time(), 3.0);
    }
}
