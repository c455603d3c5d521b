use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use studysync::cli::args::{Cli, Commands};
use studysync::cli::commands::{self, Context, SettingsChange};
use studysync::logging::init_logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let (paths, config) = Context::load_config()?;
    init_logging(&config.logging.level);
    let ctx = Context::with_config(paths, config)?;
    let format = cli.output;

    let output = match cli.command {
        Commands::Status => commands::status(&ctx, format)?,
        Commands::List { status } => commands::list(&ctx, status.as_deref(), format)?,
        Commands::Add {
            operation,
            resource,
            id,
            payload,
            user,
            max_retries,
            temp_id,
        } => commands::add(
            &ctx,
            &operation,
            &resource,
            id,
            payload.as_deref(),
            &user,
            max_retries,
            temp_id,
            format,
        )?,
        Commands::Run => commands::run(&ctx, format).await?,
        Commands::Resolve { id } => commands::resolve(&ctx, &id, format)?,
        Commands::Retry => commands::retry(&ctx, format)?,
        Commands::Remove { id } => commands::remove(&ctx, &id, format)?,
        Commands::Clear { all, force } => commands::clear(&ctx, all, force, format)?,
        Commands::Settings {
            retry_delay,
            max_size,
            auto_sync,
            retention_days,
        } => commands::settings(
            &ctx,
            SettingsChange {
                retry_delay_ms: retry_delay,
                max_queue_size: max_size,
                auto_sync_online: auto_sync,
                retention_days,
            },
            format,
        )?,
    };

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
