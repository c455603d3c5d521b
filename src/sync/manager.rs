//! Sync manager.
//!
//! The single service object that owns the queue. Hosts enqueue mutations
//! with [`SyncManager::add_to_queue`] and drain them with
//! [`SyncManager::process_queue`], either directly or through connectivity
//! events fed to [`SyncManager::start`].
//!
//! A pass walks the due actions in dispatch order: deletions first, then
//! updates, then creations, oldest first within a priority. A creation is
//! pulled forward to run right before the first action that references its
//! temp id, and dependents of a creation that did not land in this pass wait
//! for the next one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::action::{ActionStatus, Mutation, OfflineAction, ResourceType};
use super::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use super::cache::{affected_resources, CacheInvalidator, LogInvalidator};
use super::eviction::make_room;
use super::executor::{MutationApi, MutationExecutor, DEFAULT_TIMEOUT};
use super::listeners::{Listener, ListenerHub, Subscription};
use super::network::{ConnectivityEvent, NetworkMonitor};
use super::queue::{QueueStats, QueueStore};
use super::resolver::IdResolver;
use super::retry::RetryScheduler;
use super::settings::SyncSettings;
use crate::error::SyncError;
use crate::storage::KeyValueStore;

/// Construction parameters for [`SyncManager`].
#[derive(Clone)]
pub struct ManagerConfig {
    /// Breaker thresholds
    pub breaker: BreakerConfig,
    /// Per-call transport timeout
    pub timeout: Duration,
    /// Host cache hook
    pub cache: Arc<dyn CacheInvalidator>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            cache: Arc::new(LogInvalidator),
        }
    }
}

/// Options for [`SyncManager::add_to_queue`].
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Retry budget; the configured default when `None`
    pub max_retries: Option<u32>,
    /// Start a pass right away if online
    pub sync_immediately: bool,
    /// Caller-chosen temp id for creations
    pub temp_id: Option<String>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            max_retries: None,
            sync_immediately: true,
            temp_id: None,
        }
    }
}

/// Outcome of one attempted action.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    /// The action as it was after the attempt
    pub action: OfflineAction,
    pub success: bool,
    /// Response body on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure class, see [`SyncError::kind`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl SyncResult {
    fn succeeded(action: OfflineAction, data: Value) -> Self {
        Self {
            action,
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    fn failed(action: OfflineAction, error: &SyncError) -> Self {
        Self {
            action,
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Order of attempts for one pass.
#[derive(Debug, Default, PartialEq, Eq)]
struct PassPlan {
    /// Action ids in attempt order
    order: Vec<String>,
    /// Temp ids of creations that are not due this pass
    blocked: HashSet<String>,
}

fn plan_pass(actions: Vec<OfflineAction>, now: DateTime<Utc>) -> PassPlan {
    let mut blocked = HashSet::new();
    let mut due = Vec::new();
    for action in actions
        .into_iter()
        .filter(|a| a.status == ActionStatus::Pending)
    {
        if action.is_due(now) {
            due.push(action);
        } else if let Some(temp_id) = &action.temp_id {
            blocked.insert(temp_id.clone());
        }
    }
    due.sort_by(OfflineAction::dispatch_order);

    let mut placed = vec![false; due.len()];
    let mut order = Vec::with_capacity(due.len());
    for index in 0..due.len() {
        place(index, &due, &mut placed, &mut order);
    }
    PassPlan { order, blocked }
}

fn place(index: usize, due: &[OfflineAction], placed: &mut [bool], order: &mut Vec<String>) {
    if placed[index] {
        return;
    }
    placed[index] = true;

    let prerequisites: Vec<usize> = due
        .iter()
        .enumerate()
        .filter(|(i, _)| !placed[*i])
        .filter_map(|(i, candidate)| {
            let temp_id = candidate.temp_id.as_deref()?;
            due[index].mutation.references(temp_id).then_some(i)
        })
        .collect();
    for prerequisite in prerequisites {
        place(prerequisite, due, placed, order);
    }

    order.push(due[index].id.clone());
}

/// Offline-first sync service.
pub struct SyncManager {
    kv: Arc<dyn KeyValueStore>,
    queue: Arc<QueueStore>,
    resolver: Arc<IdResolver>,
    executor: MutationExecutor,
    breaker: CircuitBreaker,
    network: Arc<NetworkMonitor>,
    listeners: ListenerHub,
    cache: Arc<dyn CacheInvalidator>,
    settings: RwLock<SyncSettings>,
    processing: AtomicBool,
    this: Weak<SyncManager>,
}

impl SyncManager {
    /// Build the service over a key/value store and a remote API.
    ///
    /// Actions left in flight by an earlier process are put back to pending.
    ///
    /// # Errors
    ///
    /// Returns an error if in-flight recovery cannot be persisted.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        api: Arc<dyn MutationApi>,
        config: ManagerConfig,
    ) -> Result<Arc<Self>, SyncError> {
        let queue = Arc::new(QueueStore::new(kv.clone()));
        let recovered = queue.recover_in_flight()?;
        if recovered > 0 {
            warn!(recovered, "Recovered actions left in flight");
        }

        let resolver = Arc::new(IdResolver::new(kv.clone(), queue.clone()));
        let executor = MutationExecutor::with_timeout(api, resolver.clone(), config.timeout);
        let settings = SyncSettings::load(kv.as_ref());

        Ok(Arc::new_cyclic(|this| Self {
            kv,
            queue,
            resolver,
            executor,
            breaker: CircuitBreaker::new(config.breaker),
            network: Arc::new(NetworkMonitor::new()),
            listeners: ListenerHub::new(),
            cache: config.cache,
            settings: RwLock::new(settings),
            processing: AtomicBool::new(false),
            this: this.clone(),
        }))
    }

    /// Queue a mutation.
    ///
    /// Makes room first when the queue is full. If nothing can be evicted the
    /// action is admitted anyway.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a duplicate caller temp id, or a
    /// storage error if the queue cannot be written.
    pub fn add_to_queue(
        &self,
        mutation: Mutation,
        resource_type: ResourceType,
        user_id: &str,
        options: AddOptions,
    ) -> Result<OfflineAction, SyncError> {
        let settings = self.settings();
        let max_retries = options.max_retries.unwrap_or(settings.default_max_retries);
        let action = OfflineAction::new(
            mutation,
            resource_type,
            user_id,
            max_retries,
            options.temp_id,
        );

        let max_size = settings.max_queue_size;
        let retention = settings.retention();
        let outcome = self.queue.modify(|actions| {
            if actions.iter().any(|a| a.id == action.id) {
                return Err(SyncError::Validation(format!(
                    "Temp id already queued: {}",
                    action.id
                )));
            }
            let evicted = if actions.len() >= max_size {
                make_room(actions, max_size, retention, Utc::now())
            } else {
                Vec::new()
            };
            let still_full = actions.len() >= max_size;
            actions.push(action.clone());
            Ok((evicted, still_full))
        })?;
        let (evicted, still_full) = outcome?;

        for old in &evicted {
            warn!(
                action_id = %old.id,
                operation = %old.operation(),
                priority = %old.priority,
                "Evicted queued action"
            );
        }
        if still_full {
            warn!(max_size, "Queue over capacity, nothing left to evict");
        }
        info!(
            action_id = %action.id,
            operation = %action.operation(),
            resource = %action.resource_type,
            "Queued action"
        );
        self.notify();

        if options.sync_immediately && self.network.is_online() {
            self.spawn_pass();
        }
        Ok(action)
    }

    fn spawn_pass(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime, leaving queue for the next pass");
            return;
        };
        let this = self.this.clone();
        runtime.spawn(async move {
            if let Some(manager) = this.upgrade() {
                if let Err(e) = manager.process_queue().await {
                    error!(error = %e, "Sync pass aborted");
                }
            }
        });
    }

    /// Run one processing pass. Returns one result per attempted action, or
    /// nothing if a pass is already running.
    ///
    /// # Errors
    ///
    /// Only storage failures abort a pass; progress made up to that point
    /// stays persisted.
    pub async fn process_queue(&self) -> Result<Vec<SyncResult>, SyncError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Pass already running");
            return Ok(Vec::new());
        }
        let _guard = ProcessingGuard(&self.processing);

        let settings = self.settings();
        let scheduler = RetryScheduler::new(settings.retry_delay());
        let plan = plan_pass(self.queue.load_all(), Utc::now());
        if plan.order.is_empty() {
            debug!("Nothing due");
            return Ok(Vec::new());
        }
        info!(due = plan.order.len(), "Starting sync pass");

        let mut unresolved = plan.blocked;
        let mut results = Vec::new();
        for id in &plan.order {
            // Re-read so rewrites from earlier creations are visible
            let Some(mut action) = self.queue.get(id) else {
                continue;
            };
            if action.status != ActionStatus::Pending {
                continue;
            }
            if let Some(temp_id) = unresolved.iter().find(|t| action.mutation.references(t)) {
                debug!(action_id = %action.id, temp_id = %temp_id, "Waiting for creation, skipping");
                continue;
            }
            if !results.is_empty() && !settings.throttle().is_zero() {
                tokio::time::sleep(settings.throttle()).await;
            }

            action.status = ActionStatus::Syncing;
            self.queue.update(&action)?;
            self.notify();

            let result = self.attempt(action, &scheduler, &mut unresolved).await?;
            results.push(result);
            self.notify();
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            attempted = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Sync pass finished"
        );
        Ok(results)
    }

    async fn attempt(
        &self,
        mut action: OfflineAction,
        scheduler: &RetryScheduler,
        unresolved: &mut HashSet<String>,
    ) -> Result<SyncResult, SyncError> {
        let outcome = self.breaker.call(self.executor.execute(&action)).await;

        let error = match outcome {
            Ok(outcome) => {
                if let (Some(temp_id), Some(real_id)) = (&action.temp_id, &outcome.real_id) {
                    self.resolver.record_mapping(temp_id, real_id)?;
                }
                self.queue.remove(&action.id)?;
                for resource in affected_resources(&action) {
                    self.cache.invalidate(resource);
                }
                info!(
                    action_id = %action.id,
                    operation = %action.operation(),
                    resource = %action.resource_type,
                    "Synced action"
                );
                return Ok(SyncResult::succeeded(action, outcome.response));
            }
            Err(e) => e,
        };

        if let Some(temp_id) = &action.temp_id {
            unresolved.insert(temp_id.clone());
        }
        action.last_error = Some(error.to_string());

        match &error {
            SyncError::CircuitOpen { retry_in } => {
                action.status = ActionStatus::Pending;
                debug!(
                    action_id = %action.id,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Circuit open, action stays pending"
                );
            }
            SyncError::Validation(message) => {
                action.status = ActionStatus::Failed;
                warn!(action_id = %action.id, error = %message, "Action is invalid, giving up");
            }
            _ => {
                action.retry_count += 1;
                if action.retry_count >= action.max_retries {
                    action.status = ActionStatus::Failed;
                    action.next_retry_at = None;
                    warn!(
                        action_id = %action.id,
                        retry_count = action.retry_count,
                        error = %error,
                        "Retries exhausted"
                    );
                } else {
                    action.status = ActionStatus::Pending;
                    let at = scheduler.next_retry_at(action.retry_count - 1, Utc::now());
                    action.next_retry_at = Some(at);
                    debug!(
                        action_id = %action.id,
                        retry_count = action.retry_count,
                        next_retry_at = %at,
                        error = %error,
                        "Attempt failed, will retry"
                    );
                }
            }
        }

        self.queue.update(&action)?;
        Ok(SyncResult::failed(action, &error))
    }

    /// Current queue statistics.
    #[must_use]
    pub fn get_queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Every queued action in dispatch order.
    #[must_use]
    pub fn list_actions(&self) -> Vec<OfflineAction> {
        let mut actions = self.queue.load_all();
        actions.sort_by(OfflineAction::dispatch_order);
        actions
    }

    /// Register a statistics listener. It is called at once with the
    /// current statistics.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.listeners.subscribe(listener, &self.get_queue_stats())
    }

    fn notify(&self) {
        if !self.listeners.is_empty() {
            self.listeners.notify(&self.get_queue_stats());
        }
    }

    /// Resolve a temp id to its server id, or return `id` unchanged.
    #[must_use]
    pub fn resolve_temp_id(&self, id: &str) -> String {
        self.resolver.resolve(id)
    }

    /// Start consuming connectivity events. Coming back online starts a pass
    /// when auto-sync is enabled.
    pub fn start(&self, events: mpsc::Receiver<ConnectivityEvent>) {
        let this = self.this.clone();
        self.network.spawn_observer(events, move || {
            let this = this.clone();
            async move {
                let Some(manager) = this.upgrade() else {
                    return;
                };
                if !manager.settings().auto_sync_online {
                    debug!("Back online, auto-sync disabled");
                    return;
                }
                info!("Back online, syncing");
                if let Err(e) = manager.process_queue().await {
                    error!(error = %e, "Sync pass aborted");
                }
            }
        });
    }

    /// Stop observing connectivity and drop every listener. A pass already
    /// running finishes.
    pub fn stop(&self) {
        self.network.stop();
        self.listeners.clear();
    }

    /// Apply one connectivity event directly. Returns `true` when it brought
    /// the device online.
    pub fn observe_connectivity(&self, event: ConnectivityEvent) -> bool {
        self.network.observe(event)
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Current sync settings.
    #[must_use]
    pub fn settings(&self) -> SyncSettings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Persist and apply new settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    pub fn update_settings(&self, settings: SyncSettings) -> Result<(), SyncError> {
        settings.save(self.kv.as_ref())?;
        let mut current = self
            .settings
            .write()
            .map_err(|_| SyncError::Database("Settings lock poisoned".to_string()))?;
        *current = settings;
        info!("Sync settings updated");
        Ok(())
    }

    /// Give failed actions a fresh retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn retry_failed(&self) -> Result<usize, SyncError> {
        let reset = self.queue.retry_failed()?;
        if reset > 0 {
            info!(reset, "Failed actions requeued");
            self.notify();
        }
        Ok(reset)
    }

    /// Drop failed actions.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear_failed(&self) -> Result<usize, SyncError> {
        let removed = self.queue.clear_failed()?;
        if removed > 0 {
            info!(removed, "Failed actions cleared");
            self.notify();
        }
        Ok(removed)
    }

    /// Drop one action.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no such action is queued.
    pub fn remove_action(&self, id: &str) -> Result<(), SyncError> {
        if !self.queue.remove(id)? {
            return Err(SyncError::NotFound(format!("Action not found: {id}")));
        }
        info!(action_id = id, "Action removed");
        self.notify();
        Ok(())
    }

    /// Drop every action.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear_queue(&self) -> Result<usize, SyncError> {
        let removed = self.queue.clear()?;
        info!(removed, "Queue cleared");
        self.notify();
        Ok(removed)
    }

    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Close the circuit and forget its failure history.
    pub fn reset_circuit(&self) {
        self.breaker.reset();
    }

    /// Number of known temp id mappings.
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.resolver.len()
    }
}
