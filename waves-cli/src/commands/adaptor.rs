//! Adaptor command handlers
//!
//! Lists the registered adaptor classes and checks adaptor configurations:
//! redacted dumps, connection tests and serialized envelopes.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use waves_runner::adaptor::JobAdaptor;

use super::parse_key_val;
use crate::config::Config;
use crate::id_resolver::resolve_job;

/// Adaptor subcommands
#[derive(Subcommand)]
pub enum AdaptorCommands {
    /// List registered adaptor classes and their parameters
    List,
    /// Print an adaptor configuration, secrets masked
    DumpConfig {
        /// Adaptor class key
        #[arg(required_unless_present = "job")]
        clazz: Option<String>,

        /// Configuration values
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Dump the adaptor a job was configured with instead
        #[arg(long, conflicts_with_all = ["clazz", "params"])]
        job: Option<String>,
    },
    /// Try to connect with an adaptor configuration
    TestConnection {
        /// Adaptor class key
        clazz: String,

        /// Configuration values
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Print the JSON envelope of an adaptor configuration
    Serialize {
        /// Adaptor class key
        clazz: String,

        /// Configuration values
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Handle adaptor commands
pub async fn handle_adaptor_command(command: AdaptorCommands, config: &Config) -> Result<()> {
    match command {
        AdaptorCommands::List => list_adaptors(config),
        AdaptorCommands::DumpConfig { clazz, params, job } => {
            dump_config(config, clazz, &params, job).await
        }
        AdaptorCommands::TestConnection { clazz, params } => {
            test_connection(config, &clazz, &params).await
        }
        AdaptorCommands::Serialize { clazz, params } => serialize(config, &clazz, &params),
    }
}

fn list_adaptors(config: &Config) -> Result<()> {
    println!("{}", "Registered adaptors:".bold());
    println!();
    for class in config.registry.classes() {
        println!("  {} {}", "▸".cyan(), class.key.bold());
        println!("    {}", class.description.dimmed());
        for line in class.init_params().dump().lines() {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}

async fn dump_config(
    config: &Config,
    clazz: Option<String>,
    params: &[(String, String)],
    job: Option<String>,
) -> Result<()> {
    let adaptor = match (job, clazz) {
        (Some(id), _) => {
            let job = resolve_job(config.repository.as_ref(), &id).await?;
            config.job_adaptor(&job)?
        }
        (None, Some(clazz)) => config.adaptor(&clazz, params)?,
        (None, None) => bail!("Either an adaptor class or --job is required"),
    };

    println!("{}", adaptor.dump_config());
    print_readiness(&adaptor);
    Ok(())
}

async fn test_connection(config: &Config, clazz: &str, params: &[(String, String)]) -> Result<()> {
    let mut adaptor = config.adaptor(clazz, params)?;
    let target = adaptor.connexion_string();

    println!("Testing connection to {}...", target.cyan());
    if adaptor.test_connection().await {
        println!("{} {}", "✓ Connected to".green(), target);
        Ok(())
    } else {
        print_readiness(&adaptor);
        bail!("Connection to {} failed", target)
    }
}

fn serialize(config: &Config, clazz: &str, params: &[(String, String)]) -> Result<()> {
    let adaptor = config.adaptor(clazz, params)?;
    let envelope = adaptor.serialize(&config.cipher);
    let json = serde_json::to_string_pretty(&envelope).context("Failed to encode envelope")?;
    println!("{}", json);
    Ok(())
}

fn print_readiness(adaptor: &JobAdaptor) {
    if let Err(e) = adaptor.check_ready() {
        println!("{} {}", "⚠".yellow(), e.to_string().yellow());
    }
}
