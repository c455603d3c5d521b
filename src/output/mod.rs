//! Output formatting for studysync.
//!
//! Every command renders either colored text for humans or pretty-printed
//! JSON for scripts.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::sync::{CircuitState, OfflineAction, QueueStats, SyncResult};

pub use json::*;
pub use pretty::*;

/// Format queue statistics based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_stats(
    stats: &QueueStats,
    circuit: CircuitState,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_stats_pretty(stats, circuit)),
        OutputFormat::Json => format_stats_json(stats, circuit),
    }
}

/// Format queued actions based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_actions(
    actions: &[OfflineAction],
    title: &str,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_actions_pretty(actions, title)),
        OutputFormat::Json => format_actions_json(actions),
    }
}

/// Format a single action based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_action(action: &OfflineAction, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_action_pretty(action)),
        OutputFormat::Json => to_json(action),
    }
}

/// Format pass results based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_results(results: &[SyncResult], format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_results_pretty(results)),
        OutputFormat::Json => format_results_json(results),
    }
}
