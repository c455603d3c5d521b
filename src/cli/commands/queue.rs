//! Queue inspection and editing commands.

use serde_json::{json, Value};

use super::Context;
use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::output::{format_action, format_actions, format_stats, to_json};
use crate::sync::{ActionStatus, AddOptions, Mutation, Operation, ResourceType};

/// Show queue counters and breaker state.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn status(ctx: &Context, format: OutputFormat) -> Result<String, SyncError> {
    let stats = ctx.manager.get_queue_stats();
    format_stats(&stats, ctx.manager.circuit_state(), format)
}

/// List queued actions, optionally filtered by status.
///
/// # Errors
///
/// Returns an error if the status filter is unknown or output formatting
/// fails.
pub fn list(
    ctx: &Context,
    status: Option<&str>,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let filter = status.map(str::parse::<ActionStatus>).transpose()?;
    let actions: Vec<_> = ctx
        .manager
        .list_actions()
        .into_iter()
        .filter(|a| filter.map_or(true, |s| a.status == s))
        .collect();

    let title = filter.map_or_else(
        || "Queued Actions".to_string(),
        |s| format!("{} Actions", capitalize(&s.to_string())),
    );
    format_actions(&actions, &title, format)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Build a mutation from command-line parts.
///
/// # Errors
///
/// Returns a validation error if the id or payload does not fit the
/// operation.
pub fn build_mutation(
    operation: Operation,
    id: Option<String>,
    payload: Option<&str>,
) -> Result<Mutation, SyncError> {
    let payload: Option<Value> = payload
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| SyncError::Validation(format!("Payload is not valid JSON: {e}")))
        })
        .transpose()?;

    let require_id = || {
        id.clone().ok_or_else(|| {
            SyncError::Validation(format!("--id is required for {}", operation.as_str()))
        })
    };

    let value = match operation {
        Operation::Create => payload.unwrap_or_else(|| json!({})),
        Operation::Update => json!({
            "id": require_id()?,
            "changes": payload.unwrap_or_else(|| json!({})),
        }),
        Operation::Delete | Operation::Restore | Operation::Complete => {
            json!({ "id": require_id()? })
        }
        Operation::BatchDelete | Operation::BatchRestore => payload.ok_or_else(|| {
            SyncError::Validation(format!(
                "--payload with an items list is required for {}",
                operation.as_str()
            ))
        })?,
    };

    Mutation::from_parts(operation, value)
}

/// Queue a mutation.
///
/// # Errors
///
/// Returns an error if the mutation is malformed or cannot be stored.
#[allow(clippy::too_many_arguments)]
pub fn add(
    ctx: &Context,
    operation: &str,
    resource: &str,
    id: Option<String>,
    payload: Option<&str>,
    user: &str,
    max_retries: Option<u32>,
    temp_id: Option<String>,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let operation: Operation = operation.parse()?;
    let resource: ResourceType = resource.parse()?;
    let mutation = build_mutation(operation, id, payload)?;

    let action = ctx.manager.add_to_queue(
        mutation,
        resource,
        user,
        AddOptions {
            max_retries,
            sync_immediately: false,
            temp_id,
        },
    )?;

    match format {
        OutputFormat::Json => to_json(&action),
        OutputFormat::Pretty => {
            let mut output = format!("Queued {} {}", action.operation(), action.resource_type);
            if let Some(temp_id) = &action.temp_id {
                output.push_str(&format!(" (temp id: {temp_id})"));
            }
            output.push('\n');
            output.push_str(&format_action(&action, format)?);
            Ok(output)
        }
    }
}

/// Remove one action.
///
/// # Errors
///
/// Returns an error if the action does not exist.
pub fn remove(ctx: &Context, id: &str, format: OutputFormat) -> Result<String, SyncError> {
    ctx.manager.remove_action(id)?;
    match format {
        OutputFormat::Json => to_json(&json!({ "removed": id })),
        OutputFormat::Pretty => Ok(format!("Removed action {id}")),
    }
}

/// Clear failed actions, or everything with `--all --force`.
///
/// # Errors
///
/// Returns an error if `--all` is used without `--force` or the queue
/// cannot be written.
pub fn clear(ctx: &Context, all: bool, force: bool, format: OutputFormat) -> Result<String, SyncError> {
    if all {
        if !force {
            return Err(SyncError::Config(
                "Use --force to clear all actions".to_string(),
            ));
        }
        let count = ctx.manager.clear_queue()?;
        return match format {
            OutputFormat::Json => to_json(&json!({ "cleared": count, "scope": "all" })),
            OutputFormat::Pretty => Ok(format!("Cleared {count} actions from queue")),
        };
    }

    let count = ctx.manager.clear_failed()?;
    match format {
        OutputFormat::Json => to_json(&json!({ "cleared": count, "scope": "failed" })),
        OutputFormat::Pretty => Ok(format!("Cleared {count} failed actions")),
    }
}

/// Requeue failed actions.
///
/// # Errors
///
/// Returns an error if the queue cannot be written.
pub fn retry(ctx: &Context, format: OutputFormat) -> Result<String, SyncError> {
    let count = ctx.manager.retry_failed()?;
    match format {
        OutputFormat::Json => to_json(&json!({ "reset": count })),
        OutputFormat::Pretty => Ok(format!("Reset {count} failed actions for retry")),
    }
}

/// Resolve a temp id.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn resolve(ctx: &Context, id: &str, format: OutputFormat) -> Result<String, SyncError> {
    let resolved = ctx.manager.resolve_temp_id(id);
    let mapped = resolved != id;
    match format {
        OutputFormat::Json => to_json(&json!({ "id": id, "resolved": resolved, "mapped": mapped })),
        OutputFormat::Pretty if mapped => Ok(format!("{id} -> {resolved}")),
        OutputFormat::Pretty => Ok(format!("{id} (no mapping)")),
    }
}
