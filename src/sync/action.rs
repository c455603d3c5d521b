//! Offline actions and their payloads.
//!
//! An [`OfflineAction`] is one queued mutation. The operation and the shape of
//! its payload are a single [`Mutation`] value, so every consumer matches on
//! them together.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::SyncError;

/// Prefix of temp ids generated by this crate.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// A full or partial record as sent to the server.
pub type Record = Map<String, Value>;

/// Generate a fresh client-side temporary id.
#[must_use]
pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

/// Whether `id` was generated by [`new_temp_id`].
#[must_use]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Operation kinds that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Create a record
    Create,
    /// Patch some fields of a record
    Update,
    /// Soft-delete a record
    Delete,
    /// Undo a soft delete
    Restore,
    /// Mark a record as done
    Complete,
    /// Delete several records in one call
    BatchDelete,
    /// Restore several records in one call
    BatchRestore,
}

impl Operation {
    /// Wire name of the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Restore => "RESTORE",
            Self::Complete => "COMPLETE",
            Self::BatchDelete => "BATCH_DELETE",
            Self::BatchRestore => "BATCH_RESTORE",
        }
    }

    /// Dispatch priority of this operation.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        match self {
            // Deletions first, so the server never works on data the user removed
            Self::Delete | Self::BatchDelete => Priority::High,
            Self::Update | Self::Complete | Self::Restore | Self::BatchRestore => Priority::Normal,
            Self::Create => Priority::Low,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "restore" => Ok(Self::Restore),
            "complete" => Ok(Self::Complete),
            "batch_delete" => Ok(Self::BatchDelete),
            "batch_restore" => Ok(Self::BatchRestore),
            _ => Err(SyncError::Validation(format!("Unknown operation: {s}"))),
        }
    }
}

/// Kinds of records the planner syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Assignment,
    Lecture,
    StudySession,
    Course,
}

impl ResourceType {
    /// Wire name of the resource type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Lecture => "lecture",
            Self::StudySession => "study_session",
            Self::Course => "course",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "assignment" => Ok(Self::Assignment),
            "lecture" => Ok(Self::Lecture),
            "study_session" => Ok(Self::StudySession),
            "course" => Ok(Self::Course),
            _ => Err(SyncError::Validation(format!("Unknown resource type: {s}"))),
        }
    }
}

/// Coarse ordering hint. Variants are declared in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Queue status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Waiting for the next pass
    Pending,
    /// Currently being sent
    Syncing,
    /// Gave up; stays queued until removed or manually retried
    Failed,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ActionStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncError::Validation(format!("Unknown status: {s}"))),
        }
    }
}

/// Payload for update operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub id: String,
    #[serde(default)]
    pub changes: Record,
}

/// Payload for delete/restore/complete operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPayload {
    pub id: String,
}

/// One record addressed by a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// Payload for batch operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub items: Vec<BatchItem>,
}

/// A mutation together with its operation-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    Create(Record),
    Update(UpdatePayload),
    Delete(TargetPayload),
    Restore(TargetPayload),
    Complete(TargetPayload),
    BatchDelete(BatchPayload),
    BatchRestore(BatchPayload),
}

impl Mutation {
    /// Create a record.
    #[must_use]
    pub const fn create(record: Record) -> Self {
        Self::Create(record)
    }

    /// Patch fields of a record.
    #[must_use]
    pub fn update(id: impl Into<String>, changes: Record) -> Self {
        Self::Update(UpdatePayload {
            id: id.into(),
            changes,
        })
    }

    /// Delete a record.
    #[must_use]
    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete(TargetPayload { id: id.into() })
    }

    /// Restore a record.
    #[must_use]
    pub fn restore(id: impl Into<String>) -> Self {
        Self::Restore(TargetPayload { id: id.into() })
    }

    /// Complete a record.
    #[must_use]
    pub fn complete(id: impl Into<String>) -> Self {
        Self::Complete(TargetPayload { id: id.into() })
    }

    /// Delete several records.
    #[must_use]
    pub const fn batch_delete(items: Vec<BatchItem>) -> Self {
        Self::BatchDelete(BatchPayload { items })
    }

    /// Restore several records.
    #[must_use]
    pub const fn batch_restore(items: Vec<BatchItem>) -> Self {
        Self::BatchRestore(BatchPayload { items })
    }

    /// Build a mutation from an operation name and a raw JSON payload.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the payload does not fit the operation.
    pub fn from_parts(operation: Operation, payload: Value) -> Result<Self, SyncError> {
        let tagged = serde_json::json!({
            "operation": operation.as_str(),
            "payload": payload,
        });
        serde_json::from_value(tagged).map_err(|e| {
            SyncError::Validation(format!("Invalid {operation} payload: {e}"))
        })
    }

    /// The operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
            Self::Restore(_) => Operation::Restore,
            Self::Complete(_) => Operation::Complete,
            Self::BatchDelete(_) => Operation::BatchDelete,
            Self::BatchRestore(_) => Operation::BatchRestore,
        }
    }

    /// The primary record id, for single-target operations.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Update(p) => Some(&p.id),
            Self::Delete(p) | Self::Restore(p) | Self::Complete(p) => Some(&p.id),
            Self::Create(_) | Self::BatchDelete(_) | Self::BatchRestore(_) => None,
        }
    }

    /// Whether `id` appears anywhere this mutation addresses a record:
    /// target id, batch items, or a top-level string field (foreign keys).
    #[must_use]
    pub fn references(&self, id: &str) -> bool {
        match self {
            Self::Create(record) => record_references(record, id),
            Self::Update(p) => p.id == id || record_references(&p.changes, id),
            Self::Delete(p) | Self::Restore(p) | Self::Complete(p) => p.id == id,
            Self::BatchDelete(p) | Self::BatchRestore(p) => p.items.iter().any(|i| i.id == id),
        }
    }

    /// Replace every reference to `from` with `to`. Returns whether anything
    /// changed.
    pub fn rewrite_id(&mut self, from: &str, to: &str) -> bool {
        match self {
            Self::Create(record) => rewrite_record(record, from, to),
            Self::Update(p) => {
                let mut changed = rewrite_record(&mut p.changes, from, to);
                if p.id == from {
                    p.id = to.to_string();
                    changed = true;
                }
                changed
            }
            Self::Delete(p) | Self::Restore(p) | Self::Complete(p) => {
                if p.id == from {
                    p.id = to.to_string();
                    true
                } else {
                    false
                }
            }
            Self::BatchDelete(p) | Self::BatchRestore(p) => {
                let mut changed = false;
                for item in p.items.iter_mut().filter(|i| i.id == from) {
                    item.id = to.to_string();
                    changed = true;
                }
                changed
            }
        }
    }
}

fn record_references(record: &Record, id: &str) -> bool {
    record.values().any(|v| v.as_str() == Some(id))
}

fn rewrite_record(record: &mut Record, from: &str, to: &str) -> bool {
    let mut changed = false;
    for value in record.values_mut() {
        if value.as_str() == Some(from) {
            *value = Value::String(to.to_string());
            changed = true;
        }
    }
    changed
}

/// A queued mutation with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    /// Client-generated id. Equals `temp_id` for creations.
    pub id: String,
    /// What to send
    pub mutation: Mutation,
    /// Record kind the mutation applies to
    pub resource_type: ResourceType,
    /// When the action was queued (FIFO key)
    pub timestamp: DateTime<Utc>,
    /// Current status
    pub status: ActionStatus,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Attempts allowed before the action is marked failed
    pub max_retries: u32,
    /// Owner of the mutation
    pub user_id: String,
    /// Temporary record id, creations only
    pub temp_id: Option<String>,
    /// Derived from the operation
    pub priority: Priority,
    /// Earliest time of the next attempt
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Last failure message
    #[serde(default)]
    pub last_error: Option<String>,
}

impl OfflineAction {
    /// Create a new pending action.
    ///
    /// For creations `temp_id` is used as the action id, or a fresh one is
    /// generated. Other operations ignore it.
    #[must_use]
    pub fn new(
        mutation: Mutation,
        resource_type: ResourceType,
        user_id: impl Into<String>,
        max_retries: u32,
        temp_id: Option<String>,
    ) -> Self {
        let operation = mutation.operation();
        let temp_id = match operation {
            Operation::Create => Some(temp_id.unwrap_or_else(new_temp_id)),
            _ => None,
        };
        let id = temp_id
            .clone()
            .unwrap_or_else(|| format!("action_{}", Uuid::new_v4()));

        Self {
            id,
            mutation,
            resource_type,
            timestamp: Utc::now(),
            status: ActionStatus::Pending,
            retry_count: 0,
            max_retries,
            user_id: user_id.into(),
            temp_id,
            priority: operation.priority(),
            next_retry_at: None,
            last_error: None,
        }
    }

    /// The operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.mutation.operation()
    }

    /// Whether the action should be attempted at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ActionStatus::Pending && self.next_retry_at.map_or(true, |at| at <= now)
    }

    /// Dispatch order: higher priority first, then older first.
    #[must_use]
    pub fn dispatch_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_temp_id_only_for_create() {
        let create = OfflineAction::new(
            Mutation::create(record(json!({"title": "Read ch. 3"}))),
            ResourceType::StudySession,
            "u1",
            3,
            None,
        );
        assert!(create.temp_id.is_some());
        assert_eq!(create.temp_id.as_deref(), Some(create.id.as_str()));
        assert!(is_temp_id(&create.id));

        let delete = OfflineAction::new(
            Mutation::delete("S1"),
            ResourceType::StudySession,
            "u1",
            3,
            Some("ignored".to_string()),
        );
        assert!(delete.temp_id.is_none());
        assert!(delete.id.starts_with("action_"));
    }

    #[test]
    fn test_caller_supplied_temp_id() {
        let action = OfflineAction::new(
            Mutation::create(Record::new()),
            ResourceType::Course,
            "u1",
            3,
            Some("T1".to_string()),
        );
        assert_eq!(action.id, "T1");
        assert_eq!(action.temp_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_priority_derivation() {
        assert_eq!(Operation::Delete.priority(), Priority::High);
        assert_eq!(Operation::Update.priority(), Priority::Normal);
        assert_eq!(Operation::Create.priority(), Priority::Low);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_mutation_wire_format() {
        let mutation = Mutation::update("S1", record(json!({"title": "New"})));
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["operation"], "UPDATE");
        assert_eq!(value["payload"]["id"], "S1");
        assert_eq!(value["payload"]["changes"]["title"], "New");

        let batch = Mutation::batch_delete(vec![BatchItem {
            id: "A1".to_string(),
            resource_type: ResourceType::Assignment,
        }]);
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["operation"], "BATCH_DELETE");
        assert_eq!(value["payload"]["items"][0]["type"], "assignment");
    }

    #[test]
    fn test_from_parts() {
        let mutation = Mutation::from_parts(Operation::Complete, json!({"id": "A9"})).unwrap();
        assert_eq!(mutation, Mutation::complete("A9"));

        let err = Mutation::from_parts(Operation::Delete, json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_rewrite_id_everywhere() {
        let mut update = Mutation::update("T1", record(json!({"course_id": "T1", "title": "T1x"})));
        assert!(update.references("T1"));
        assert!(update.rewrite_id("T1", "C7"));
        assert_eq!(update.target_id(), Some("C7"));
        assert!(!update.references("T1"));
        if let Mutation::Update(p) = &update {
            assert_eq!(p.changes["course_id"], "C7");
            assert_eq!(p.changes["title"], "T1x");
        }

        let mut batch = Mutation::batch_restore(vec![
            BatchItem {
                id: "T1".to_string(),
                resource_type: ResourceType::Lecture,
            },
            BatchItem {
                id: "L2".to_string(),
                resource_type: ResourceType::Lecture,
            },
        ]);
        assert!(batch.rewrite_id("T1", "L1"));
        assert!(!batch.rewrite_id("T1", "L1"));
        assert!(batch.references("L1") && batch.references("L2"));

        let mut create = Mutation::create(record(json!({"course_id": "T1"})));
        assert!(create.rewrite_id("T1", "C7"));
        assert!(create.references("C7"));
    }

    #[test]
    fn test_dispatch_order() {
        let mut create = OfflineAction::new(Mutation::create(Record::new()), ResourceType::Course, "u", 3, None);
        let mut delete = OfflineAction::new(Mutation::delete("X"), ResourceType::Course, "u", 3, None);
        create.timestamp = Utc::now() - chrono::Duration::minutes(5);
        delete.timestamp = Utc::now();

        let mut actions = vec![create.clone(), delete.clone()];
        actions.sort_by(OfflineAction::dispatch_order);
        assert_eq!(actions[0].id, delete.id);

        let mut older = OfflineAction::new(Mutation::delete("Y"), ResourceType::Course, "u", 3, None);
        older.timestamp = delete.timestamp - chrono::Duration::seconds(1);
        delete.timestamp = Utc::now();
        let mut actions = vec![delete.clone(), older.clone()];
        actions.sort_by(OfflineAction::dispatch_order);
        assert_eq!(actions[0].id, older.id);
    }

    #[test]
    fn test_is_due() {
        let mut action = OfflineAction::new(Mutation::delete("X"), ResourceType::Course, "u", 3, None);
        let now = Utc::now();
        assert!(action.is_due(now));

        action.next_retry_at = Some(now + chrono::Duration::seconds(30));
        assert!(!action.is_due(now));
        assert!(action.is_due(now + chrono::Duration::seconds(31)));

        action.next_retry_at = None;
        action.status = ActionStatus::Failed;
        assert!(!action.is_due(now));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("batch-delete".parse::<Operation>().unwrap(), Operation::BatchDelete);
        assert_eq!("study_session".parse::<ResourceType>().unwrap(), ResourceType::StudySession);
        assert_eq!("FAILED".parse::<ActionStatus>().unwrap(), ActionStatus::Failed);
        assert!("archive".parse::<Operation>().is_err());
    }
}
