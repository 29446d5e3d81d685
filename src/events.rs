//! Named-event subscription registry
//!
//! A plain callback registry: no timing, no failure policy, no
//! coordination beyond invoking stored callbacks. Handlers are
//! snapshotted under the lock and invoked after it is released, so a
//! handler may subscribe or emit without deadlocking the bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};

type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type OnceCallback<T> = Box<dyn FnOnce(&T) + Send + Sync>;

struct PersistentHandler<T> {
    id: u64,
    callback: EventCallback<T>,
}

struct Registry<T> {
    handlers: HashMap<String, Vec<PersistentHandler<T>>>,
    once_handlers: HashMap<String, Vec<OnceCallback<T>>>,
    waiters: HashMap<String, Vec<mpsc::Sender<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            once_handlers: HashMap::new(),
            waiters: HashMap::new(),
        }
    }
}

/// Handle for a persistent subscription, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event: String,
    id: u64,
}

/// Registry of named events with persistent, one-shot, and
/// channel-based subscriptions
///
/// # Example
///
/// ```rust
/// use fusebox::EventBus;
///
/// let bus: EventBus<String> = EventBus::new();
///
/// let sub = bus.on("login", |user| println!("user logged in: {user}"));
/// bus.emit("login", &"neeraj".to_string());
///
/// bus.off(&sub);
/// bus.emit("login", &"nobody listens".to_string());
/// ```
pub struct EventBus<T> {
    registry: Mutex<Registry<T>>,
    next_id: AtomicU64,
}

impl<T> EventBus<T> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe to an event; the callback runs on every matching emit
    /// until the returned handle is passed to [`EventBus::off`]
    pub fn on<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);

        let mut registry = self.registry.lock().unwrap();
        registry
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(PersistentHandler {
                id,
                callback: Arc::new(callback),
            });

        Subscription {
            event: event.to_string(),
            id,
        }
    }

    /// Remove a persistent subscription; returns false if it was
    /// already removed
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut registry = self.registry.lock().unwrap();
        let Some(handlers) = registry.handlers.get_mut(&subscription.event) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|h| h.id != subscription.id);
        handlers.len() < before
    }

    /// Subscribe to the next matching emit only
    pub fn once<F>(&self, event: &str, callback: F)
    where
        F: FnOnce(&T) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap();
        registry
            .once_handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(callback));
    }

    /// Wait for the next matching emit through a channel
    ///
    /// The returned receiver yields exactly one value; after the event
    /// fires the sender is dropped and further receives disconnect.
    pub fn once_recv(&self, event: &str) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel();

        let mut registry = self.registry.lock().unwrap();
        registry
            .waiters
            .entry(event.to_string())
            .or_default()
            .push(tx);

        rx
    }

    /// Number of persistent handlers registered for an event
    pub fn handler_count(&self, event: &str) -> usize {
        let registry = self.registry.lock().unwrap();
        registry.handlers.get(event).map(Vec::len).unwrap_or(0)
    }
}

impl<T: Clone> EventBus<T> {
    /// Emit an event, invoking persistent handlers, draining one-shot
    /// handlers, and fulfilling channel waiters
    ///
    /// Emitting an event nobody subscribed to is a no-op.
    pub fn emit(&self, event: &str, data: &T) {
        let (persistent, once, waiters) = {
            let mut registry = self.registry.lock().unwrap();

            let persistent: Vec<EventCallback<T>> = registry
                .handlers
                .get(event)
                .map(|hs| hs.iter().map(|h| Arc::clone(&h.callback)).collect())
                .unwrap_or_default();
            let once = registry.once_handlers.remove(event).unwrap_or_default();
            let waiters = registry.waiters.remove(event).unwrap_or_default();

            (persistent, once, waiters)
        };

        for callback in persistent {
            callback(data);
        }
        for callback in once {
            callback(data);
        }
        for waiter in waiters {
            // Receiver may already be gone
            let _ = waiter.send(data.clone());
        }
    }

    /// Broadcast to every handler of every event, draining all
    /// one-shot handlers and waiters
    pub fn emit_all(&self, data: &T) {
        let (persistent, once, waiters) = {
            let mut registry = self.registry.lock().unwrap();

            let persistent: Vec<EventCallback<T>> = registry
                .handlers
                .values()
                .flat_map(|hs| hs.iter().map(|h| Arc::clone(&h.callback)))
                .collect();
            let once: Vec<OnceCallback<T>> = registry
                .once_handlers
                .drain()
                .flat_map(|(_, callbacks)| callbacks)
                .collect();
            let waiters: Vec<mpsc::Sender<T>> = registry
                .waiters
                .drain()
                .flat_map(|(_, senders)| senders)
                .collect();

            (persistent, once, waiters)
        };

        for callback in persistent {
            callback(data);
        }
        for callback in once {
            callback(data);
        }
        for waiter in waiters {
            let _ = waiter.send(data.clone());
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock().unwrap();
        f.debug_struct("EventBus")
            .field("events", &registry.handlers.len())
            .field("once_events", &registry.once_handlers.len())
            .field("waiters", &registry.waiters.len())
            .finish()
    }
}
