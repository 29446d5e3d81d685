//! Fusebox - resilience and notification primitives
//!
//! This crate provides:
//! - A concurrency-safe circuit breaker that trips after a run of
//!   consecutive failures and recovers lazily after a cool-off window
//! - Monotonic time tracking to prevent NTP clock skew issues
//! - An injectable "opened" hook for observability
//! - An event bus and a publisher/observer broadcaster, the usual
//!   consumers sitting on top of a breaker
//!
//! # Example
//!
//! ```rust
//! use fusebox::CircuitBreaker;
//!
//! let circuit = CircuitBreaker::builder("my_service")
//!     .failure_threshold(5)
//!     .cool_off_secs(30.0)
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Execute with circuit protection
//! let result = circuit.call(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//! assert!(result.is_ok());
//!
//! // Check circuit state
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod clock;
pub mod errors;
pub mod events;
pub mod publisher;
pub mod tally;

pub use builder::CircuitBuilder;
pub use circuit::{CircuitBreaker, Config};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::CircuitError;
pub use events::{EventBus, Subscription};
pub use publisher::{Publisher, SubscriberId};
pub use tally::FailureTally;
