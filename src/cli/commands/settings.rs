use colored::Colorize;

use super::Context;
use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::output::to_json;
use crate::sync::SyncSettings;

/// Longest retention window accepted from the command line.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Requested settings changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsChange {
    pub retry_delay_ms: Option<u64>,
    pub max_queue_size: Option<usize>,
    pub auto_sync_online: Option<bool>,
    pub retention_days: Option<u32>,
}

impl SettingsChange {
    const fn is_empty(&self) -> bool {
        self.retry_delay_ms.is_none()
            && self.max_queue_size.is_none()
            && self.auto_sync_online.is_none()
            && self.retention_days.is_none()
    }

    fn apply(self, mut settings: SyncSettings) -> Result<SyncSettings, SyncError> {
        if let Some(ms) = self.retry_delay_ms {
            settings.retry_delay_ms = ms;
        }
        if let Some(size) = self.max_queue_size {
            if size == 0 {
                return Err(SyncError::Validation(
                    "Queue size must be at least 1".to_string(),
                ));
            }
            settings.max_queue_size = size;
        }
        if let Some(auto) = self.auto_sync_online {
            settings.auto_sync_online = auto;
        }
        if let Some(days) = self.retention_days {
            if days > MAX_RETENTION_DAYS {
                return Err(SyncError::Validation(format!(
                    "Retention must be at most {MAX_RETENTION_DAYS} days"
                )));
            }
            settings.retention_days = days;
        }
        Ok(settings)
    }
}

/// Show the sync settings, applying any requested changes first.
///
/// # Errors
///
/// Returns an error if a value is invalid or the settings cannot be saved.
pub fn settings(
    ctx: &Context,
    change: SettingsChange,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let updated = !change.is_empty();
    if updated {
        let next = change.apply(ctx.manager.settings())?;
        ctx.manager.update_settings(next)?;
    }

    let current = ctx.manager.settings();
    match format {
        OutputFormat::Json => to_json(&current),
        OutputFormat::Pretty => {
            let mut lines = Vec::new();
            if updated {
                lines.push(format!("{} Settings saved", "✓".green()));
            }
            lines.push("Sync Settings".bold().to_string());
            lines.push("─".repeat(40));
            lines.push(format!("  Retry delay:   {} ms", current.retry_delay_ms));
            lines.push(format!("  Queue size:    {}", current.max_queue_size));
            lines.push(format!("  Auto sync:     {}", current.auto_sync_online));
            lines.push(format!("  Retention:     {} days", current.retention_days));
            lines.push(format!("  Throttle:      {} ms", current.throttle_ms));
            lines.push(format!("  Max retries:   {}", current.default_max_retries));
            Ok(lines.join("\n"))
        }
    }
}
