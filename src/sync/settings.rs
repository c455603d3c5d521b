//! Sync tuning knobs, persisted next to the queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SyncError;
use crate::storage::{KeyValueStore, SYNC_CONFIG_KEY};

/// Persisted sync configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Start a pass when connectivity returns
    pub auto_sync_online: bool,
    /// Queue capacity
    pub max_queue_size: usize,
    /// Age after which actions become eviction candidates
    pub retention_days: u32,
    /// Pause between two actions of a pass, in milliseconds
    pub throttle_ms: u64,
    /// Retry budget for actions queued without an explicit one
    pub default_max_retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: 5000,
            auto_sync_online: true,
            max_queue_size: 100,
            retention_days: 7,
            throttle_ms: 100,
            default_max_retries: 3,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Load settings. Missing or corrupt storage yields the defaults.
    #[must_use]
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        match kv.get(SYNC_CONFIG_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Sync settings are corrupt, using defaults");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read sync settings, using defaults");
                Self::default()
            }
        }
    }

    /// Persist settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<(), SyncError> {
        let raw = serde_json::to_string(self)?;
        kv.set(SYNC_CONFIG_KEY, &raw)
    }
}
