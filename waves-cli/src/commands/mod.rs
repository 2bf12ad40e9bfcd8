//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod adaptor;
mod job;
mod queue;

pub use adaptor::AdaptorCommands;
pub use job::JobCommands;
pub use queue::QueueCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use waves_core::domain::JobStatus;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job inspection and cancellation
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Adaptor configuration checks
    Adaptor {
        #[command(subcommand)]
        command: AdaptorCommands,
    },
    /// Job queue reconciliation
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Adaptor { command } => adaptor::handle_adaptor_command(command, config).await,
        Commands::Queue { command } => queue::handle_queue_command(command, config).await,
    }
}

/// Parses a `key=value` pair
pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=value: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=value: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Colorize job status for display
pub(crate) fn colorize_status(status: JobStatus) -> ColoredString {
    let label = format!("{:?}", status);
    match status {
        JobStatus::Undefined => label.red().dimmed(),
        JobStatus::Created | JobStatus::Prepared => label.normal(),
        JobStatus::Queued => label.yellow(),
        JobStatus::Running => label.cyan(),
        JobStatus::Suspended => label.magenta(),
        JobStatus::Completed => label.blue(),
        JobStatus::Finished => label.green(),
        JobStatus::Cancelled => label.dimmed(),
        JobStatus::Warning => label.yellow().bold(),
        JobStatus::Error => label.red(),
    }
}
