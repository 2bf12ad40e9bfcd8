//! Job command handlers
//!
//! Handles all job-related CLI commands including listing, viewing details
//! and history, cancelling, and showing command lines and run details.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use waves_core::domain::{Job, JobHistory};
use waves_runner::service::{LifecycleService, StepOutcome};

use super::colorize_status;
use crate::config::Config;
use crate::id_resolver::resolve_job;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List jobs
    List {
        /// Only jobs still driven by the queue
        #[arg(long)]
        pending: bool,
    },
    /// Show job details
    Show {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Show job history
    History {
        /// Job ID or unambiguous prefix
        id: String,

        /// Include admin-only records
        #[arg(long)]
        admin: bool,
    },
    /// Cancel a job
    Cancel {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Print the full command line of a job
    CommandLine {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Show where, when and how a job ran
    RunDetails {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    match command {
        JobCommands::List { pending } => list_jobs(config, pending).await,
        JobCommands::Show { id } => show_job(config, &id).await,
        JobCommands::History { id, admin } => show_history(config, &id, admin).await,
        JobCommands::Cancel { id } => cancel_job(config, &id).await,
        JobCommands::CommandLine { id } => command_line(config, &id).await,
        JobCommands::RunDetails { id } => run_details(config, &id).await,
    }
}

async fn list_jobs(config: &Config, pending: bool) -> Result<()> {
    let jobs = if pending {
        config.repository.pending_jobs().await?
    } else {
        config.repository.list_jobs().await?
    };

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn show_job(config: &Config, id: &str) -> Result<()> {
    let job = resolve_job(config.repository.as_ref(), id).await?;
    print_job_details(&job);
    Ok(())
}

async fn show_history(config: &Config, id: &str, admin: bool) -> Result<()> {
    let job = resolve_job(config.repository.as_ref(), id).await?;

    println!("{}", format!("History of job {}:", job.id).bold());
    println!("{}", "─".repeat(80).dimmed());
    if admin {
        job.history().iter().for_each(print_history_record);
    } else {
        job.public_history().for_each(print_history_record);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

async fn cancel_job(config: &Config, id: &str) -> Result<()> {
    let mut job = resolve_job(config.repository.as_ref(), id).await?;
    let mut adaptor = config.job_adaptor(&job)?;

    let outcome = config.lifecycle().cancel(&mut job, &mut adaptor).await;
    if let Err(e) = adaptor.disconnect().await {
        eprintln!("{} {}", "⚠ Disconnect failed:".yellow(), e);
    }

    match outcome? {
        StepOutcome::CancelRefused(reason) => {
            println!(
                "{} {}",
                "✗ Backend refused to cancel job:".red(),
                reason
            );
            println!(
                "{}",
                "  The job is unchanged and may still be running.".dimmed()
            );
        }
        _ => println!("{} {}", "✓ Cancelled job".green(), job.id),
    }

    Ok(())
}

async fn command_line(config: &Config, id: &str) -> Result<()> {
    let mut job = resolve_job(config.repository.as_ref(), id).await?;

    match config.job_adaptor(&job) {
        Ok(adaptor) => println!("{}", adaptor.command_line(&mut job)),
        // arguments only, the command comes with the adaptor
        Err(_) => println!("{}", job.resolve_command_line()),
    }

    Ok(())
}

async fn run_details(config: &Config, id: &str) -> Result<()> {
    let job = resolve_job(config.repository.as_ref(), id).await?;
    let mut adaptor = config.job_adaptor(&job)?;

    let details = adaptor.job_run_details(&job).await;
    if let Err(e) = adaptor.disconnect().await {
        eprintln!("{} {}", "⚠ Disconnect failed:".yellow(), e);
    }
    let details = details?;

    println!("{}", "Run Details:".bold());
    println!("  Name:        {}", details.name);
    if let Some(remote_id) = &details.remote_job_id {
        println!("  Remote ID:   {}", remote_id.cyan());
    }
    println!(
        "  Created:     {}",
        details.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(started) = details.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(finished) = details.finished_at {
        println!("  Finished:    {}", finished.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = details.started_at {
            let duration = finished.signed_duration_since(started);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }
    if let Some(code) = details.exit_code {
        println!("  Exit Code:   {}", code);
    }
    if !details.execution_hosts.is_empty() {
        println!("  Hosts:       {}", details.execution_hosts.join(", "));
    }

    Ok(())
}

/// Print a one-line-per-field job summary
fn print_job_summary(job: &Job) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Title:    {}", job.title);
    println!("    Status:   {}", colorize_status(job.status()));
    println!(
        "    Updated:  {}",
        job.updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(adaptor) = &job.adaptor_config {
        println!("    Adaptor:  {}", adaptor.clazz.dimmed());
    }
    println!();
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Title:       {}", job.title);
    println!("  Status:      {}", colorize_status(job.status()));
    if let Some(message) = &job.message {
        println!("  Message:     {}", message);
    }
    println!(
        "  Created:     {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated:     {}",
        job.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Directory:   {}", job.working_directory.display());
    if let Some(client) = &job.client {
        println!("  Client:      {}", client);
    }
    if let Some(adaptor) = &job.adaptor_config {
        println!("  Adaptor:     {}", adaptor.clazz);
    }
    if let Some(remote_id) = &job.remote_job_id {
        println!("  Remote ID:   {}", remote_id);
    }
    if job.retry_count > 0 {
        println!("  Retries:     {}", job.retry_count.to_string().yellow());
    }
    if let Some(code) = job.exit_code {
        println!("  Exit Code:   {}", code);
    }
    println!(
        "  Results:     {}",
        if job.results_available {
            "✓".green()
        } else {
            "✗".dimmed()
        }
    );

    if !job.inputs.is_empty() {
        println!("\n{}", "Inputs:".bold());
        for input in &job.inputs {
            let value = input
                .param
                .resolved_value()
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {} = {}", input.param.name.cyan(), value);
        }
    }

    if !job.outputs.is_empty() {
        println!("\n{}", "Outputs:".bold());
        for output in &job.outputs {
            println!("  {} -> {}", output.name.cyan(), output.file_name);
        }
    }
}

fn print_history_record(record: &JobHistory) {
    let marker = if record.is_admin {
        "admin".magenta()
    } else {
        "".normal()
    };
    println!(
        "{} [{}] {} {}",
        record
            .timestamp
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed(),
        colorize_status(record.status),
        record.message,
        marker
    );
}
