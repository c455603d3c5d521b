//! Keyed blob storage.
//!
//! The sync subsystem persists three independent documents. Each mutating
//! call writes through before returning.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::SyncError;

use super::Database;

/// Key of the pending-action queue blob.
pub const QUEUE_KEY: &str = "offline_queue";
/// Key of the sync configuration blob.
pub const SYNC_CONFIG_KEY: &str = "sync_config";
/// Key of the temp-id mapping table blob.
pub const ID_MAPPINGS_KEY: &str = "id_mappings";

/// Durable string storage addressed by key.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write does not reach the backing storage.
    fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), SyncError>;
}

/// `SQLite`-backed store.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    /// Wrap an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the database at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, SyncError> {
        Ok(Self::new(Database::open()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, SyncError> {
        self.db
            .lock()
            .map_err(|_| SyncError::Database("Database lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.db()?.get_blob(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.db()?.put_blob(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.db()?.delete_blob(key).map(|_| ())
    }
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, SyncError> {
        self.entries
            .lock()
            .map_err(|_| SyncError::Database("Memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.entries()?.remove(key);
        Ok(())
    }
}
