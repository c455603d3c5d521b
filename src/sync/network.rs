//! Connectivity tracking.
//!
//! The host platform pushes [`ConnectivityEvent`]s into a channel; the monitor
//! folds them into a single online flag and reports offline to online
//! transitions.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One connectivity report from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityEvent {
    /// A network interface is up
    pub is_connected: bool,
    /// The internet is reachable, if the platform knows
    pub is_internet_reachable: Option<bool>,
}

impl ConnectivityEvent {
    #[must_use]
    pub const fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    #[must_use]
    pub const fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
        }
    }

    /// Whether this report counts as online. Unknown reachability on a
    /// connected interface is treated as online.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.is_connected && !matches!(self.is_internet_reachable, Some(false))
    }
}

/// Tracks whether the device is online.
#[derive(Debug, Default)]
pub struct NetworkMonitor {
    online: AtomicBool,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// Create a monitor. It reports offline until the first event arrives.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Apply one event. Returns `true` on an offline to online transition.
    pub fn observe(&self, event: ConnectivityEvent) -> bool {
        let online = event.is_online();
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            info!(online, "Connectivity changed");
        } else {
            debug!(online, "Connectivity unchanged");
        }
        online && !was_online
    }

    /// Consume `events` on a background task, spawning `on_online` after each
    /// offline to online transition. Replaces any previous observer.
    ///
    /// The reaction runs on its own task, so [`stop`](Self::stop) ends event
    /// consumption without cutting off work already started.
    pub fn spawn_observer<F, Fut>(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ConnectivityEvent>,
        on_online: F,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let monitor = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                if monitor.observe(event) {
                    tokio::spawn(on_online());
                }
            }
            debug!("Connectivity channel closed");
        });

        if let Ok(mut slot) = self.observer.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Stop observing. The last known state is kept.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.observer.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
