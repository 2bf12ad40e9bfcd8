//! Queue command handlers
//!
//! Runs the reconciliation loop by hand, one tick at a time.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use waves_runner::scheduler::JobQueueDaemon;

use crate::config::Config;

/// Queue subcommands
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Run exactly one reconciliation pass over pending jobs
    Tick,
}

/// Handle queue commands
pub async fn handle_queue_command(command: QueueCommands, config: &Config) -> Result<()> {
    match command {
        QueueCommands::Tick => tick(config).await,
    }
}

async fn tick(config: &Config) -> Result<()> {
    let daemon = JobQueueDaemon::new(
        &config.runner,
        Arc::clone(&config.repository),
        config.lifecycle(),
        Arc::clone(&config.registry),
        config.cipher.clone(),
        CancellationToken::new(),
    );

    let summary = daemon.tick().await?;

    if summary.processed == 0 {
        println!("{}", "No pending jobs.".yellow());
    } else {
        println!("{} {}", "✓ Tick done:".green(), summary);
        if summary.failed > 0 || summary.errors > 0 {
            println!(
                "{}",
                "  Some jobs failed, see `waves job history <id> --admin`.".dimmed()
            );
        }
    }

    Ok(())
}
