//! Error types for circuit breaker calls

use std::error::Error;
use std::fmt;

/// Errors surfaced by [`CircuitBreaker::call`](crate::CircuitBreaker::call)
///
/// The breaker never swallows or translates the protected operation's
/// error; it only adds the fast-fail `Open` path on top.
#[derive(Debug)]
pub enum CircuitError<E = Box<dyn Error + Send + Sync>> {
    /// Circuit is open and the cool-off has not elapsed; the protected
    /// operation was not invoked. Carries no detail about the
    /// underlying failures.
    Open {
        circuit: String,
        /// Monotonic time at which the circuit tripped
        opened_at: f64,
    },
    /// The protected operation failed; the original error, verbatim
    Execution(E),
}

impl<E: fmt::Display> fmt::Display for CircuitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Open { circuit, opened_at } => {
                write!(
                    f,
                    "circuit '{}' is open, try again after the cool-off (tripped at {:.3}s)",
                    circuit, opened_at
                )
            }
            CircuitError::Execution(e) => write!(f, "protected operation failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CircuitError::Execution(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }
}
