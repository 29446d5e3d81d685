//! Publisher/observer broadcaster
//!
//! A flat observer list with no event names: every notification goes
//! to every current subscriber, in subscription order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

type ObserverCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle identifying one subscriber, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Observer<T> {
    id: SubscriberId,
    callback: ObserverCallback<T>,
}

/// Broadcaster that notifies every subscribed observer
///
/// # Example
///
/// ```rust
/// use fusebox::Publisher;
///
/// let publisher: Publisher<&str> = Publisher::new();
///
/// let id = publisher.subscribe(|event| println!("observer received: {event}"));
/// publisher.notify(&"event #1");
///
/// publisher.unsubscribe(id);
/// publisher.notify(&"event #2"); // nobody listens
/// ```
pub struct Publisher<T> {
    subscribers: RwLock<Vec<Observer<T>>>,
    next_id: AtomicU64,
}

impl<T> Publisher<T> {
    /// Create a publisher with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Add an observer; returns its id for later removal
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::AcqRel));

        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.push(Observer {
            id,
            callback: Arc::new(callback),
        });

        id
    }

    /// Remove an observer; returns false if it was already removed
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        let before = subscribers.len();
        subscribers.retain(|o| o.id != id);
        subscribers.len() < before
    }

    /// Notify all current subscribers, in subscription order
    pub fn notify(&self, data: &T) {
        // Snapshot so an observer can subscribe/unsubscribe re-entrantly
        let snapshot: Vec<ObserverCallback<T>> = {
            let subscribers = self.subscribers.read().unwrap();
            subscribers.iter().map(|o| Arc::clone(&o.callback)).collect()
        };

        for callback in snapshot {
            callback(data);
        }
    }

    /// Number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
