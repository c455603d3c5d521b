//! JSON output formatting for studysync.

use serde::Serialize;
use serde_json::json;

use crate::error::SyncError;
use crate::sync::{CircuitState, OfflineAction, QueueStats, SyncResult};

/// Serialize any value as pretty JSON.
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Format queue statistics as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_stats_json(stats: &QueueStats, circuit: CircuitState) -> Result<String, SyncError> {
    let output = json!({
        "total": stats.total,
        "pending": stats.pending,
        "syncing": stats.syncing,
        "failed": stats.failed,
        "oldest_timestamp": stats.oldest_timestamp.map(|t| t.to_rfc3339()),
        "circuit": circuit,
    });
    to_json(&output)
}

/// Format queued actions as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_actions_json(actions: &[OfflineAction]) -> Result<String, SyncError> {
    let output = json!({
        "count": actions.len(),
        "items": actions,
    });
    to_json(&output)
}

/// Format pass results as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_results_json(results: &[SyncResult]) -> Result<String, SyncError> {
    let succeeded = results.iter().filter(|r| r.success).count();
    let output = json!({
        "attempted": results.len(),
        "succeeded": succeeded,
        "failed": results.len() - succeeded,
        "results": results,
    });
    to_json(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Mutation, ResourceType};

    #[test]
    fn test_stats_json() {
        let stats = QueueStats {
            total: 3,
            pending: 2,
            syncing: 0,
            failed: 1,
            oldest_timestamp: None,
        };
        let json = format_stats_json(&stats, CircuitState::HalfOpen).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["circuit"], "half_open");
        assert!(value["oldest_timestamp"].is_null());
    }

    #[test]
    fn test_actions_json() {
        let action = OfflineAction::new(
            Mutation::delete("A1"),
            ResourceType::Assignment,
            "u1",
            3,
            None,
        );
        let json = format_actions_json(&[action]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["items"][0]["mutation"]["operation"], "DELETE");
        assert_eq!(value["items"][0]["status"], "pending");
        assert_eq!(value["items"][0]["priority"], "high");
    }
}
