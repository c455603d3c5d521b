use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::sync::{ActionStatus, CircuitState, OfflineAction, Priority, QueueStats, SyncResult};

fn age(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(timestamp);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Format queue statistics
pub fn format_stats_pretty(stats: &QueueStats, circuit: CircuitState) -> String {
    let mut lines = Vec::new();

    lines.push("Sync Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:    {} {}",
        stats.pending,
        if stats.pending > 0 {
            "actions waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));
    lines.push(format!("  Syncing:    {}", stats.syncing));
    lines.push(format!(
        "  Failed:     {} {}",
        stats.failed,
        if stats.failed > 0 {
            "actions need attention".red()
        } else {
            "".normal()
        }
    ));

    if let Some(oldest) = stats.oldest_timestamp {
        lines.push(format!("  Oldest:     {}", age(oldest).dimmed()));
    }

    let circuit_str = match circuit {
        CircuitState::Closed => circuit.to_string().green(),
        CircuitState::HalfOpen => circuit.to_string().yellow(),
        CircuitState::Open => circuit.to_string().red(),
    };
    lines.push(format!("  Circuit:    {circuit_str}"));

    if stats.pending > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'studysync run' to replay pending actions"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

fn status_icon(status: ActionStatus) -> String {
    match status {
        ActionStatus::Pending => "⏳".to_string(),
        ActionStatus::Syncing => "▶".cyan().to_string(),
        ActionStatus::Failed => "✗".red().to_string(),
    }
}

fn priority_label(priority: Priority) -> String {
    match priority {
        Priority::High => "high".red().to_string(),
        Priority::Normal => "normal".to_string(),
        Priority::Low => "low".dimmed().to_string(),
    }
}

/// Format queued actions as a table
pub fn format_actions_pretty(actions: &[OfflineAction], title: &str) -> String {
    if actions.is_empty() {
        return format!("{title} (0 actions)\n  Queue is empty");
    }

    let mut lines = Vec::new();
    lines.push(format!("{title} ({} actions)", actions.len()));
    lines.push("─".repeat(78));
    lines.push(format!(
        "{:<3} {:<14} {:<14} {:<8} {:<7} {}",
        "", "Operation", "Resource", "Priority", "Tries", "Id"
    ));
    lines.push("─".repeat(78));

    for action in actions {
        lines.push(format!(
            "{:<3} {:<14} {:<14} {:<8} {:<7} {}",
            status_icon(action.status),
            action.operation().as_str(),
            action.resource_type.as_str(),
            action.priority.to_string(),
            format!("{}/{}", action.retry_count, action.max_retries),
            action.id.dimmed()
        ));

        if let Some(target) = action.mutation.target_id() {
            lines.push(format!("    {} {}", "target:".dimmed(), target));
        }
        if let Some(error) = &action.last_error {
            lines.push(format!("    {}", shorten(error, 70).red()));
        }
    }

    lines.join("\n")
}

/// Format a single action
pub fn format_action_pretty(action: &OfflineAction) -> String {
    let mut output = format!(
        "{} {} {}\n",
        status_icon(action.status),
        action.operation().as_str().bold(),
        action.resource_type
    );
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), action.id));
    if let Some(target) = action.mutation.target_id() {
        output.push_str(&format!("  {}: {}\n", "Target".dimmed(), target));
    }
    output.push_str(&format!("  {}: {}\n", "Status".dimmed(), action.status));
    output.push_str(&format!(
        "  {}: {}\n",
        "Priority".dimmed(),
        priority_label(action.priority)
    ));
    output.push_str(&format!(
        "  {}: {}/{}\n",
        "Tries".dimmed(),
        action.retry_count,
        action.max_retries
    ));
    output.push_str(&format!("  {}: {}\n", "User".dimmed(), action.user_id));
    output.push_str(&format!(
        "  {}: {}",
        "Queued".dimmed(),
        action.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    output
}

/// Format the results of a processing pass
pub fn format_results_pretty(results: &[SyncResult]) -> String {
    if results.is_empty() {
        return "No actions due.".to_string();
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;

    let mut lines = Vec::new();
    lines.push(format!(
        "{} {} synced, {} failed",
        "Sync pass:".bold(),
        succeeded.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    ));

    for result in results {
        let action = &result.action;
        if result.success {
            lines.push(format!(
                "  {} {} {}",
                "✓".green(),
                action.operation().as_str(),
                action.resource_type
            ));
        } else {
            let outcome = match action.status {
                ActionStatus::Failed => "gave up".red().to_string(),
                _ => format!("retry {}/{}", action.retry_count, action.max_retries)
                    .yellow()
                    .to_string(),
            };
            lines.push(format!(
                "  {} {} {} ({outcome})",
                "✗".red(),
                action.operation().as_str(),
                action.resource_type
            ));
            if let Some(error) = &result.error {
                lines.push(format!("      {}", shorten(error, 70).dimmed()));
            }
        }
    }

    lines.join("\n")
}
