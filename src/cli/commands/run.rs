use tracing::info;

use super::Context;
use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::output::format_results;

/// Run one processing pass and report what happened.
///
/// # Errors
///
/// Returns an error if the queue cannot be read or written.
pub async fn run(ctx: &Context, format: OutputFormat) -> Result<String, SyncError> {
    info!(endpoint = %ctx.config.remote.base_url, "replaying queue");
    let results = ctx.manager.process_queue().await?;
    format_results(&results, format)
}
