//! Persistent queue store.
//!
//! The queue is one JSON document under [`QUEUE_KEY`]. Every mutating call is
//! load, modify, replace under one write lock: the new state is on disk
//! before the call returns.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::action::{ActionStatus, OfflineAction};
use crate::error::SyncError;
use crate::storage::{KeyValueStore, QUEUE_KEY};

/// Durable list of queued actions.
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl QueueStore {
    /// Create a queue store over a key/value backend.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// Load every queued action.
    ///
    /// Missing or unreadable storage yields an empty queue.
    #[must_use]
    pub fn load_all(&self) -> Vec<OfflineAction> {
        let raw = match self.kv.get(QUEUE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read offline queue, starting empty");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Offline queue is corrupt, starting empty");
            Vec::new()
        })
    }

    /// Replace the whole queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be serialized or written.
    pub fn replace_all(&self, actions: &[OfflineAction]) -> Result<(), SyncError> {
        let raw = serde_json::to_string(actions)?;
        self.kv.set(QUEUE_KEY, &raw)?;
        debug!(count = actions.len(), "Persisted offline queue");
        Ok(())
    }

    /// Apply `f` to the loaded queue and persist the result, holding the
    /// store's write lock throughout.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn modify<F, R>(&self, f: F) -> Result<R, SyncError>
    where
        F: FnOnce(&mut Vec<OfflineAction>) -> R,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SyncError::Database("Queue lock poisoned".to_string()))?;
        let mut actions = self.load_all();
        let result = f(&mut actions);
        self.replace_all(&actions)?;
        Ok(result)
    }

    /// Append one action.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn append(&self, action: OfflineAction) -> Result<(), SyncError> {
        self.modify(|actions| actions.push(action))
    }

    /// Get a queued action by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<OfflineAction> {
        self.load_all().into_iter().find(|a| a.id == id)
    }

    /// Overwrite the stored copy of `action`. Returns `false` if it is no
    /// longer queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn update(&self, action: &OfflineAction) -> Result<bool, SyncError> {
        self.modify(|actions| match actions.iter_mut().find(|a| a.id == action.id) {
            Some(slot) => {
                *slot = action.clone();
                true
            }
            None => false,
        })
    }

    /// Remove an action by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn remove(&self, id: &str) -> Result<bool, SyncError> {
        self.modify(|actions| {
            let before = actions.len();
            actions.retain(|a| a.id != id);
            actions.len() != before
        })
    }

    /// Remove every action. Returns how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear(&self) -> Result<usize, SyncError> {
        self.modify(|actions| std::mem::take(actions).len())
    }

    /// Remove failed actions. Returns how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear_failed(&self) -> Result<usize, SyncError> {
        self.modify(|actions| {
            let before = actions.len();
            actions.retain(|a| a.status != ActionStatus::Failed);
            before - actions.len()
        })
    }

    /// Reset failed actions to pending with a fresh retry budget. Returns how
    /// many were reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn retry_failed(&self) -> Result<usize, SyncError> {
        self.modify(|actions| {
            let mut reset = 0;
            for action in actions.iter_mut().filter(|a| a.status == ActionStatus::Failed) {
                action.status = ActionStatus::Pending;
                action.retry_count = 0;
                action.next_retry_at = None;
                action.last_error = None;
                reset += 1;
            }
            reset
        })
    }

    /// Put actions left in flight by an interrupted pass back to pending.
    /// Returns how many were recovered.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn recover_in_flight(&self) -> Result<usize, SyncError> {
        self.modify(|actions| {
            let mut recovered = 0;
            for action in actions.iter_mut().filter(|a| a.status == ActionStatus::Syncing) {
                action.status = ActionStatus::Pending;
                recovered += 1;
            }
            recovered
        })
    }

    /// Rewrite every reference to `from` into `to` in actions that are not
    /// in flight. Returns how many actions changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn rewrite_references(&self, from: &str, to: &str) -> Result<usize, SyncError> {
        self.modify(|actions| {
            let mut changed = 0;
            for action in actions
                .iter_mut()
                .filter(|a| a.status != ActionStatus::Syncing)
            {
                if action.mutation.rewrite_id(from, to) {
                    changed += 1;
                }
            }
            changed
        })
    }

    /// Queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats::from_actions(&self.load_all())
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Number of queued actions
    pub total: usize,
    /// Waiting for a pass
    pub pending: usize,
    /// In flight
    pub syncing: usize,
    /// Gave up
    pub failed: usize,
    /// Creation time of the oldest queued action
    pub oldest_timestamp: Option<DateTime<Utc>>,
}

impl QueueStats {
    /// Compute statistics for a set of actions.
    #[must_use]
    pub fn from_actions(actions: &[OfflineAction]) -> Self {
        let count = |status: ActionStatus| actions.iter().filter(|a| a.status == status).count();
        Self {
            total: actions.len(),
            pending: count(ActionStatus::Pending),
            syncing: count(ActionStatus::Syncing),
            failed: count(ActionStatus::Failed),
            oldest_timestamp: actions.iter().map(|a| a.timestamp).min(),
        }
    }
}
