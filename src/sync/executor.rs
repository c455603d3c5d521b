//! Mutation executor.
//!
//! Turns one queued action into one remote call. Ids are resolved through the
//! [`IdResolver`] and payloads validated before anything goes on the wire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::action::{BatchItem, Mutation, OfflineAction, Record, ResourceType};
use super::resolver::IdResolver;
use crate::error::SyncError;

/// Default per-call transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote mutation endpoints.
///
/// Implementations report network failures as [`SyncError::Transport`] and
/// server rejections as [`SyncError::Application`].
#[async_trait]
pub trait MutationApi: Send + Sync {
    async fn create(&self, resource: ResourceType, record: &Record) -> Result<Value, SyncError>;
    async fn update(
        &self,
        resource: ResourceType,
        id: &str,
        changes: &Record,
    ) -> Result<Value, SyncError>;
    async fn delete(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError>;
    async fn restore(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError>;
    async fn complete(&self, resource: ResourceType, id: &str) -> Result<Value, SyncError>;
    async fn batch_delete(&self, items: &[BatchItem]) -> Result<Value, SyncError>;
    async fn batch_restore(&self, items: &[BatchItem]) -> Result<Value, SyncError>;
}

/// Result of a successful remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Response body
    pub response: Value,
    /// Server id of a created record
    pub real_id: Option<String>,
}

/// Dispatches actions to the remote API.
pub struct MutationExecutor {
    api: Arc<dyn MutationApi>,
    resolver: Arc<IdResolver>,
    timeout: Duration,
}

impl MutationExecutor {
    /// Create an executor with the default timeout.
    #[must_use]
    pub fn new(api: Arc<dyn MutationApi>, resolver: Arc<IdResolver>) -> Self {
        Self::with_timeout(api, resolver, DEFAULT_TIMEOUT)
    }

    /// Create an executor with a custom timeout.
    #[must_use]
    pub fn with_timeout(
        api: Arc<dyn MutationApi>,
        resolver: Arc<IdResolver>,
        timeout: Duration,
    ) -> Self {
        Self {
            api,
            resolver,
            timeout,
        }
    }

    /// Execute one action.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for malformed payloads (no call is
    /// made), [`SyncError::Transport`] on network failure or timeout, and
    /// [`SyncError::Application`] when the server rejects the mutation or a
    /// create response carries no id.
    pub async fn execute(&self, action: &OfflineAction) -> Result<ExecutionOutcome, SyncError> {
        let resource = action.resource_type;
        debug!(action_id = %action.id, operation = %action.operation(), resource = %resource, "Executing action");

        match &action.mutation {
            Mutation::Create(record) => {
                let response = self.bounded(self.api.create(resource, record)).await?;
                let real_id = extract_real_id(&response).ok_or_else(|| SyncError::Application {
                    status: None,
                    message: "Create response did not include an id".to_string(),
                })?;
                Ok(ExecutionOutcome {
                    response,
                    real_id: Some(real_id),
                })
            }
            Mutation::Update(payload) => {
                let id = self.resolve_target(&payload.id, "update")?;
                if payload.changes.is_empty() {
                    return Err(SyncError::Validation(
                        "Update has no fields to change".to_string(),
                    ));
                }
                let response = self
                    .bounded(self.api.update(resource, &id, &payload.changes))
                    .await?;
                Ok(plain(response))
            }
            Mutation::Delete(payload) => {
                let id = self.resolve_target(&payload.id, "delete")?;
                Ok(plain(self.bounded(self.api.delete(resource, &id)).await?))
            }
            Mutation::Restore(payload) => {
                let id = self.resolve_target(&payload.id, "restore")?;
                Ok(plain(self.bounded(self.api.restore(resource, &id)).await?))
            }
            Mutation::Complete(payload) => {
                let id = self.resolve_target(&payload.id, "complete")?;
                Ok(plain(self.bounded(self.api.complete(resource, &id)).await?))
            }
            Mutation::BatchDelete(payload) => {
                let items = self.resolve_items(&payload.items)?;
                Ok(plain(self.bounded(self.api.batch_delete(&items)).await?))
            }
            Mutation::BatchRestore(payload) => {
                let items = self.resolve_items(&payload.items)?;
                Ok(plain(self.bounded(self.api.batch_restore(&items)).await?))
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<Value, SyncError>
    where
        F: std::future::Future<Output = Result<Value, SyncError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                SyncError::Transport(format!(
                    "Request timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    fn resolve_target(&self, id: &str, verb: &str) -> Result<String, SyncError> {
        let resolved = self.resolver.resolve(id);
        if resolved.trim().is_empty() {
            return Err(SyncError::Validation(format!("Cannot {verb}: missing id")));
        }
        Ok(resolved)
    }

    fn resolve_items(&self, items: &[BatchItem]) -> Result<Vec<BatchItem>, SyncError> {
        if items.is_empty() {
            return Err(SyncError::Validation("Batch has no items".to_string()));
        }
        items
            .iter()
            .map(|item| {
                let id = self.resolver.resolve(&item.id);
                if id.trim().is_empty() {
                    return Err(SyncError::Validation("Batch item has no id".to_string()));
                }
                Ok(BatchItem {
                    id,
                    resource_type: item.resource_type,
                })
            })
            .collect()
    }
}

const fn plain(response: Value) -> ExecutionOutcome {
    ExecutionOutcome {
        response,
        real_id: None,
    }
}

/// Pull the server id out of a create response: `id` at the top level or
/// under `data`, as a non-empty string or a number.
#[must_use]
pub fn extract_real_id(response: &Value) -> Option<String> {
    let as_id = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    response
        .get("id")
        .and_then(as_id)
        .or_else(|| response.get("data").and_then(|d| d.get("id")).and_then(as_id))
}
