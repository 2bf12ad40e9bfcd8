//! WAVES CLI
//!
//! Operator interface to the WAVES job execution layer: inspect and cancel
//! jobs, check adaptor configurations, and run reconciliation by hand.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "waves")]
#[command(about = "WAVES job execution CLI", long_about = None)]
struct Cli {
    /// Root data directory of the filesystem job store
    #[arg(long, env = "WAVES_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Web layer URL, jobs are read and written over HTTP when set
    #[arg(long, env = "WAVES_JOB_STORE_URL")]
    job_store_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waves=info,waves_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.data_root, cli.job_store_url)?;

    handle_command(cli.command, &config).await
}
