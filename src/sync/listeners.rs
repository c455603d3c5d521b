//! Queue statistics subscribers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::warn;

use super::queue::QueueStats;

/// Callback receiving fresh queue statistics.
pub type Listener = Arc<dyn Fn(&QueueStats) + Send + Sync>;

type Registry = Mutex<BTreeMap<u64, Listener>>;

/// Registry of statistics listeners.
#[derive(Default)]
pub struct ListenerHub {
    next_id: AtomicU64,
    listeners: Arc<Registry>,
}

impl ListenerHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and call it once with `current`.
    pub fn subscribe(&self, listener: Listener, current: &QueueStats) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, listener.clone());
        }
        listener(current);
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    /// Call every listener with `stats`.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may subscribe or unsubscribe from inside the callback.
    pub fn notify(&self, stats: &QueueStats) {
        let snapshot: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => {
                warn!("Listener registry poisoned, skipping notification");
                return;
            }
        };
        for listener in snapshot {
            listener(stats);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener.
    pub fn clear(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
    }
}

/// Handle returned by [`ListenerHub::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the listener. Safe to call after the hub is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut listeners) = registry.lock() {
                listeners.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Listener, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |stats: &QueueStats| {
            sink.lock().unwrap().push(stats.total);
        });
        (listener, seen)
    }

    fn stats(total: usize) -> QueueStats {
        QueueStats {
            total,
            pending: total,
            ..QueueStats::default()
        }
    }

    #[test]
    fn test_subscribe_fires_immediately() {
        let hub = ListenerHub::new();
        let (listener, seen) = recorder();
        let _sub = hub.subscribe(listener, &stats(4));
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn test_notify_and_unsubscribe() {
        let hub = ListenerHub::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        let first_sub = hub.subscribe(first, &stats(0));
        let _second_sub = hub.subscribe(second, &stats(0));

        hub.notify(&stats(1));
        first_sub.unsubscribe();
        hub.notify(&stats(2));

        assert_eq!(*first_seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(*second_seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_listener_may_touch_hub() {
        let hub = Arc::new(ListenerHub::new());
        let inner_hub = hub.clone();
        let listener: Listener = Arc::new(move |_: &QueueStats| {
            let _ = inner_hub.len();
        });
        let _sub = hub.subscribe(listener, &stats(0));
        hub.notify(&stats(1));
    }

    #[test]
    fn test_clear_and_late_unsubscribe() {
        let hub = ListenerHub::new();
        let (listener, seen) = recorder();
        let sub = hub.subscribe(listener, &stats(0));
        hub.clear();
        hub.notify(&stats(5));
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        drop(hub);
        sub.unsubscribe();
    }
}
