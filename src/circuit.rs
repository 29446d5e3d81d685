//! Circuit breaker implementation using state machines
//!
//! A two-state breaker: Closed passes calls through, Open fails fast.
//! The threshold counts *consecutive* failures since the last success,
//! and recovery is an optimistic full reopen once the cool-off elapses
//! at call time. There is no half-open trial state and no background
//! timer; staleness of an Open circuit is invisible until probed.

use crate::{
    callbacks::Callbacks,
    clock::{Clock, MonotonicClock},
    errors::CircuitError,
    tally::FailureTally,
};
use state_machines::state_machine;
use std::sync::{Arc, Mutex};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Consecutive failures required to open the circuit
    pub failure_threshold: usize,

    /// Minimum seconds the circuit stays open before a call may probe
    /// again, measured from the most recent recorded failure
    pub cool_off_secs: f64,

    /// Jitter factor for the cool-off (0.0 = none, 1.0 = full jitter)
    /// Uses chrono-machines formula: cool_off * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_off_secs: 5.0,
            jitter_factor: 0.0,
        }
    }
}

/// Circuit breaker context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub tally: Arc<FailureTally>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            clock: Arc::new(MonotonicClock::new()),
            tally: Arc::new(FailureTally::new()),
        }
    }
}

impl std::fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &"<dyn Clock>")
            .field("tally", &self.tally)
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
}

// Define the breaker state machine with dynamic mode
state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,  // Enable dynamic mode for runtime state transitions

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: Closed, to: Open }
        }
        attempt_reset {
            guards: [cool_off_elapsed],
            transition: { from: Open, to: Closed }
        }
    }
}

// Guards for dynamic mode - implemented on typestate machines
impl Circuit<Closed> {
    /// Check if the consecutive failure run has reached the threshold
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        ctx.tally.failures() >= ctx.config.failure_threshold
    }
}

impl Circuit<Open> {
    /// Check if the cool-off has elapsed since the last recorded failure
    ///
    /// Measured from the last failure, not the trip instant: a failure
    /// reported by a call that was already in flight when the circuit
    /// tripped extends the window.
    fn cool_off_elapsed(&self, ctx: &CircuitContext) -> bool {
        let now = ctx.clock.monotonic_time();
        let elapsed = now - ctx.tally.last_failure_at();

        // Apply jitter using chrono-machines if jitter_factor > 0
        let cool_off_secs = if ctx.config.jitter_factor > 0.0 {
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: (ctx.config.cool_off_secs * 1000.0) as u64,
                multiplier: 1.0,
                max_delay_ms: (ctx.config.cool_off_secs * 1000.0) as u64,
            };
            let cool_off_ms = policy.calculate_delay(1, ctx.config.jitter_factor);
            (cool_off_ms as f64) / 1000.0
        } else {
            ctx.config.cool_off_secs
        };

        elapsed >= cool_off_secs
    }
}

/// Circuit breaker public API
///
/// One instance guards one protected operation and is shared by every
/// caller (typically via `Arc`). State bookkeeping is serialized by an
/// internal lock; the lock is never held while the protected operation
/// runs, so concurrent calls to the protected resource are not
/// serialized by the breaker.
pub struct CircuitBreaker {
    machine: Mutex<DynamicCircuit>,
    context: CircuitContext,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    ///
    /// # Panics
    ///
    /// Panics if `config.failure_threshold` is 0.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        let context = CircuitContext {
            name: name.into(),
            config,
            clock: Arc::new(MonotonicClock::new()),
            tally: Arc::new(FailureTally::new()),
        };

        Self::with_context_and_callbacks(context, Callbacks::new())
    }

    /// Create a circuit breaker with custom context and callbacks (used by builder)
    pub(crate) fn with_context_and_callbacks(
        context: CircuitContext,
        callbacks: Callbacks,
    ) -> Self {
        assert!(
            context.config.failure_threshold > 0,
            "failure_threshold must be greater than 0"
        );

        let machine = Mutex::new(DynamicCircuit::new(context.clone()));

        Self {
            machine,
            context,
            callbacks,
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// While the circuit is open and the cool-off has not elapsed, the
    /// operation is not invoked and the call fails fast with
    /// [`CircuitError::Open`]. Once the cool-off elapses the circuit
    /// reopens fully: the failure run is reset and this call proceeds
    /// as a fresh attempt (which can re-trip immediately at threshold
    /// 1). An operation error is counted and propagated unchanged as
    /// [`CircuitError::Execution`].
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // Gate decision under the lock, released before running f
        {
            let mut machine = self.machine.lock().unwrap();

            if machine.current_state() == "Open" {
                if machine.handle(CircuitEvent::AttemptReset).is_ok() {
                    // Cool-off elapsed: optimistic full reopen
                    self.context.tally.reset();
                } else {
                    let opened_at = machine.open_data().map(|d| d.opened_at).unwrap_or(0.0);
                    return Err(CircuitError::Open {
                        circuit: self.context.name.clone(),
                        opened_at,
                    });
                }
            }
        }

        match f() {
            Ok(val) => {
                let _guard = self.machine.lock().unwrap();
                self.context.tally.record_success();
                Ok(val)
            }
            Err(e) => {
                let mut machine = self.machine.lock().unwrap();
                let now = self.context.clock.monotonic_time();
                self.context.tally.record_failure(now);

                // Trip fails its guard below threshold and is a no-op
                // when the circuit already opened under a racing call
                let tripped = machine.handle(CircuitEvent::Trip).is_ok();
                if tripped && let Some(data) = machine.open_data_mut() {
                    data.opened_at = now;
                }
                drop(machine);

                if tripped {
                    self.callbacks.trigger_open(&self.context.name);
                }

                Err(CircuitError::Execution(e))
            }
        }
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.machine.lock().unwrap().current_state() == "Open"
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.machine.lock().unwrap().current_state() == "Closed"
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.machine.lock().unwrap().current_state()
    }

    /// Clear the failure run and return the circuit to Closed
    pub fn reset(&self) {
        let mut machine = self.machine.lock().unwrap();
        self.context.tally.reset();
        // Recreate machine in Closed state
        *machine = DynamicCircuit::new(self.context.clone());
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.context.name)
            .field("state", &self.state_name())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker_with_manual_clock(threshold: usize, cool_off_secs: f64) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let circuit = CircuitBreaker::builder("test")
            .failure_threshold(threshold)
            .cool_off_secs(cool_off_secs)
            .clock(clock.clone())
            .build();
        (circuit, clock)
    }

    #[test]
    fn test_circuit_breaker_creation() {
        let circuit = CircuitBreaker::new("test", Config::default());

        assert!(circuit.is_closed());
        assert!(!circuit.is_open());
        assert_eq!(circuit.state_name(), "Closed");
    }

    #[test]
    #[should_panic(expected = "failure_threshold must be greater than 0")]
    fn test_zero_threshold_rejected() {
        let config = Config {
            failure_threshold: 0,
            ..Default::default()
        };
        CircuitBreaker::new("test", config);
    }

    #[test]
    fn test_below_threshold_stays_closed_and_invokes() {
        let (circuit, _clock) = breaker_with_manual_clock(3, 5.0);
        let invocations = AtomicUsize::new(0);

        for _ in 0..2 {
            let _ = circuit.call(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("error")
            });
        }

        assert!(circuit.is_closed());
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_circuit_opens_at_threshold_and_fails_fast() {
        let (circuit, _clock) = breaker_with_manual_clock(3, 5.0);

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert!(circuit.is_closed());

        let _ = circuit.call(|| Err::<(), _>("error 3"));
        assert!(circuit.is_open());

        // Next call is rejected without invoking the operation
        let invoked = AtomicUsize::new(0);
        let result = circuit.call(|| {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("should not run")
        });

        assert!(matches!(result, Err(CircuitError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_success_resets_failure_run() {
        let (circuit, _clock) = breaker_with_manual_clock(3, 5.0);

        // threshold - 1 failures, then a success, repeatedly: never trips
        for _ in 0..4 {
            let _ = circuit.call(|| Err::<(), _>("error"));
            let _ = circuit.call(|| Err::<(), _>("error"));
            let _ = circuit.call(|| Ok::<_, &str>("ok"));
            assert!(circuit.is_closed());
        }
    }

    #[test]
    fn test_operation_error_propagated_verbatim() {
        let (circuit, _clock) = breaker_with_manual_clock(3, 5.0);

        let result = circuit.call(|| Err::<(), _>("boom"));
        match result {
            Err(CircuitError::Execution(e)) => assert_eq!(e, "boom"),
            other => panic!("expected Execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_cool_off_boundary() {
        let (circuit, clock) = breaker_with_manual_clock(3, 5.0);

        // Failures at t=0.000, 0.001, 0.002 trip the circuit
        let _ = circuit.call(|| Err::<(), _>("error"));
        clock.set(0.001);
        let _ = circuit.call(|| Err::<(), _>("error"));
        clock.set(0.002);
        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        // Within the window: fail fast
        clock.set(0.1);
        let result = circuit.call(|| Ok::<_, String>("early"));
        assert!(matches!(result, Err(CircuitError::Open { .. })));

        // Just before the boundary (last failure + 5.0): still fast
        clock.set(5.001);
        let result = circuit.call(|| Ok::<_, String>("still early"));
        assert!(matches!(result, Err(CircuitError::Open { .. })));

        // Past the boundary: the call goes through and the circuit closes
        clock.set(5.003);
        let invoked = AtomicUsize::new(0);
        let result = circuit.call(|| {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("recovered")
        });

        assert!(result.is_ok());
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert!(circuit.is_closed());

        // The run was reset; subsequent calls stay closed
        let _ = circuit.call(|| Err::<(), _>("error"));
        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_failing_probe_reopens_at_threshold_one() {
        let (circuit, clock) = breaker_with_manual_clock(1, 5.0);

        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        // Cool-off elapsed; probe runs but fails and re-trips immediately
        clock.set(5.1);
        let result = circuit.call(|| Err::<(), _>("probe failed"));
        assert!(matches!(result, Err(CircuitError::Execution(_))));
        assert!(circuit.is_open());

        clock.set(5.2);
        let result = circuit.call(|| Ok::<_, String>("rejected"));
        assert!(matches!(result, Err(CircuitError::Open { .. })));
    }

    #[test]
    fn test_open_error_reports_trip_time() {
        let (circuit, clock) = breaker_with_manual_clock(1, 5.0);

        clock.set(2.5);
        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_open());

        match circuit.call(|| Ok::<_, String>("rejected")) {
            Err(CircuitError::Open { circuit: name, opened_at }) => {
                assert_eq!(name, "test");
                assert_eq!(opened_at, 2.5);
            }
            other => panic!("expected Open error, got {:?}", other),
        }
    }

    #[test]
    fn test_on_open_fires_once_per_trip() {
        let opened = Arc::new(AtomicUsize::new(0));
        let opened_clone = opened.clone();
        let clock = Arc::new(ManualClock::new());

        let circuit = CircuitBreaker::builder("test")
            .failure_threshold(2)
            .cool_off_secs(5.0)
            .clock(clock.clone())
            .on_open(move |name| {
                assert_eq!(name, "test");
                opened_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert!(circuit.is_open());
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        // Fast-failed calls do not re-fire the hook
        let _ = circuit.call(|| Ok::<_, String>("rejected"));
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        // A second trip after recovery fires again
        clock.set(10.0);
        let _ = circuit.call(|| Err::<(), _>("error 3"));
        let _ = circuit.call(|| Err::<(), _>("error 4"));
        assert!(circuit.is_open());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_clears_state() {
        let (circuit, _clock) = breaker_with_manual_clock(2, 5.0);

        let _ = circuit.call(|| Err::<(), _>("error 1"));
        let _ = circuit.call(|| Err::<(), _>("error 2"));
        assert!(circuit.is_open());

        circuit.reset();
        assert!(circuit.is_closed());

        // The failure run restarts from zero after reset
        let _ = circuit.call(|| Err::<(), _>("error"));
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_shared_breaker_across_threads() {
        use std::thread;

        let (circuit, _clock) = breaker_with_manual_clock(3, 5.0);
        let circuit = Arc::new(circuit);
        let mut handles = vec![];

        for i in 0..8 {
            let circuit_clone = Arc::clone(&circuit);
            handles.push(thread::spawn(move || {
                circuit_clone.call(move || Ok::<_, String>(i)).is_ok()
            }));
        }

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_concurrent_failures_trip_once() {
        use std::thread;

        let opened = Arc::new(AtomicUsize::new(0));
        let opened_clone = opened.clone();

        let circuit = Arc::new(
            CircuitBreaker::builder("test")
                .failure_threshold(1)
                .cool_off_secs(60.0)
                .on_open(move |_name| {
                    opened_clone.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        );

        let mut handles = vec![];
        for _ in 0..8 {
            let circuit_clone = Arc::clone(&circuit);
            handles.push(thread::spawn(move || {
                let _ = circuit_clone.call(|| Err::<(), _>("error"));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(circuit.is_open());
        // Racing failures may all execute, but only one trips the circuit
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_in_flight_failure_extends_cool_off() {
        use std::sync::mpsc;
        use std::thread;

        let (circuit, clock) = breaker_with_manual_clock(1, 5.0);
        let circuit = Arc::new(circuit);

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let circuit_clone = Arc::clone(&circuit);
        let slow_call = thread::spawn(move || {
            circuit_clone.call(move || {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Err::<(), _>("slow failure")
            })
        });

        // The slow call is past the gate and executing
        entered_rx.recv().unwrap();

        // Trip the circuit at t=0 while the slow call is in flight
        let _ = circuit.call(|| Err::<(), _>("fast failure"));
        assert!(circuit.is_open());

        // The slow call fails at t=4.0, pushing the last failure forward
        clock.set(4.0);
        release_tx.send(()).unwrap();
        let result = slow_call.join().unwrap();
        assert!(matches!(result, Err(CircuitError::Execution(_))));

        // 5s after the trip but only 3s after the last failure: still open
        clock.set(7.0);
        let result = circuit.call(|| Ok::<_, String>("too soon"));
        assert!(matches!(result, Err(CircuitError::Open { .. })));

        // 5s after the last failure: allowed through
        clock.set(9.1);
        let result = circuit.call(|| Ok::<_, String>("recovered"));
        assert!(result.is_ok());
        assert!(circuit.is_closed());
    }

    #[test]
    fn test_zero_jitter_produces_constant_cool_off() {
        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: 5000,
            multiplier: 1.0,
            max_delay_ms: 5000,
        };

        let mut values = std::collections::HashSet::new();
        for _ in 0..10 {
            values.insert(policy.calculate_delay(1, 0.0));
        }

        assert_eq!(values.len(), 1, "Zero jitter should produce constant cool-off");
        assert!(values.contains(&5000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        // With 25% jitter on a 1000ms base, delays land in 750-1000ms
        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: 1000,
            multiplier: 1.0,
            max_delay_ms: 1000,
        };

        for _ in 0..50 {
            let delay_ms = policy.calculate_delay(1, 0.25);
            assert!((740..=1010).contains(&delay_ms), "delay {} out of bounds", delay_ms);
        }
    }
}
