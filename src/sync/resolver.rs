//! Temporary id resolution.
//!
//! Records created offline carry a client-generated temp id until the server
//! assigns the real one. The mapping table is append-only: a temp id is used
//! once and never remapped.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use super::queue::QueueStore;
use crate::error::SyncError;
use crate::storage::{KeyValueStore, ID_MAPPINGS_KEY};

/// Maps temp ids to server ids and rewrites queued dependents.
pub struct IdResolver {
    kv: Arc<dyn KeyValueStore>,
    queue: Arc<QueueStore>,
    mappings: RwLock<HashMap<String, String>>,
}

impl IdResolver {
    /// Create a resolver, loading the persisted mapping table.
    ///
    /// A missing or corrupt table starts empty.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, queue: Arc<QueueStore>) -> Self {
        let mappings = load_mappings(kv.as_ref());
        Self {
            kv,
            queue,
            mappings: RwLock::new(mappings),
        }
    }

    /// Resolve `id` to the server id if it is a mapped temp id, otherwise
    /// return it unchanged.
    #[must_use]
    pub fn resolve(&self, id: &str) -> String {
        self.mappings
            .read()
            .ok()
            .and_then(|m| m.get(id).cloned())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of recorded mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no mapping has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist `temp_id -> real_id`, then rewrite every queued action that
    /// still references `temp_id`. Returns how many actions were rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping table or the queue cannot be written.
    pub fn record_mapping(&self, temp_id: &str, real_id: &str) -> Result<usize, SyncError> {
        {
            let mut mappings = self
                .mappings
                .write()
                .map_err(|_| SyncError::Database("Id mapping lock poisoned".to_string()))?;

            match mappings.get(temp_id).cloned() {
                Some(existing) if existing == real_id => {}
                Some(existing) => {
                    warn!(temp_id, existing = %existing, real_id, "Temp id already mapped, keeping first mapping");
                    return Ok(0);
                }
                None => {
                    mappings.insert(temp_id.to_string(), real_id.to_string());
                    let raw = serde_json::to_string(&*mappings)?;
                    if let Err(e) = self.kv.set(ID_MAPPINGS_KEY, &raw) {
                        mappings.remove(temp_id);
                        return Err(e);
                    }
                    info!(temp_id, real_id, "Recorded id mapping");
                }
            }
        }

        let rewritten = self.queue.rewrite_references(temp_id, real_id)?;
        if rewritten > 0 {
            debug!(temp_id, real_id, rewritten, "Rewrote queued dependents");
        }
        Ok(rewritten)
    }
}

fn load_mappings(kv: &dyn KeyValueStore) -> HashMap<String, String> {
    match kv.get(ID_MAPPINGS_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Id mapping table is corrupt, starting empty");
            HashMap::new()
        }),
        Ok(None) => HashMap::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read id mapping table, starting empty");
            HashMap::new()
        }
    }
}
