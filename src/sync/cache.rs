//! Cache invalidation hook.
//!
//! After a mutation lands on the server, cached reads of the affected record
//! kind are stale. The host drops them; it never patches them in place.

use std::collections::BTreeSet;

use tracing::debug;

use super::action::{Mutation, OfflineAction, ResourceType};

/// Drops cached data for a record kind.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, resource: ResourceType);
}

/// Invalidator for hosts without a read cache. Only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInvalidator;

impl CacheInvalidator for LogInvalidator {
    fn invalidate(&self, resource: ResourceType) {
        debug!(resource = %resource, "Cache invalidated");
    }
}

/// Every record kind touched by `action`: its own type plus each distinct
/// item type of a batch.
#[must_use]
pub fn affected_resources(action: &OfflineAction) -> BTreeSet<ResourceType> {
    let mut resources = BTreeSet::from([action.resource_type]);
    if let Mutation::BatchDelete(payload) | Mutation::BatchRestore(payload) = &action.mutation {
        resources.extend(payload.items.iter().map(|item| item.resource_type));
    }
    resources
}
