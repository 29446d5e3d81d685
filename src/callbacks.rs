//! Observability hook for circuit trips
//!
//! The breaker emits exactly one event: "opened", fired on every
//! Closed -> Open transition with the circuit name. Anything textual
//! (logging, metrics, alerts) is the caller's responsibility inside
//! the injected sink; the default is a no-op.

use std::sync::Arc;

/// Injected sink for breaker transitions
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger_open(&self, circuit: &str) {
        if let Some(ref callback) = self.on_open {
            callback(circuit);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_is_noop() {
        let callbacks = Callbacks::new();
        callbacks.trigger_open("test");
    }

    #[test]
    fn test_trigger_invokes_sink_with_name() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let mut callbacks = Callbacks::new();
        callbacks.on_open = Some(Arc::new(move |name| {
            assert_eq!(name, "payments");
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.trigger_open("payments");
        callbacks.trigger_open("payments");

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
