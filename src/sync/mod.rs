//! Offline-first synchronization.
//!
//! Mutations made while offline are queued as [`OfflineAction`]s, persisted,
//! and replayed against the remote API by the [`SyncManager`] once the device
//! is back online.

pub mod action;
pub mod breaker;
pub mod cache;
pub mod eviction;
pub mod executor;
pub mod listeners;
pub mod manager;
pub mod network;
pub mod queue;
pub mod remote;
pub mod resolver;
pub mod retry;
pub mod settings;

pub use action::{
    is_temp_id, new_temp_id, ActionStatus, BatchItem, Mutation, OfflineAction, Operation,
    Priority, Record, ResourceType,
};
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use cache::{CacheInvalidator, LogInvalidator};
pub use executor::{ExecutionOutcome, MutationApi, MutationExecutor};
pub use listeners::{Listener, ListenerHub, Subscription};
pub use manager::{AddOptions, ManagerConfig, SyncManager, SyncResult};
pub use network::{ConnectivityEvent, NetworkMonitor};
pub use queue::{QueueStats, QueueStore};
pub use remote::HttpMutationApi;
pub use resolver::IdResolver;
pub use retry::RetryScheduler;
pub use settings::SyncSettings;
