//! WAVES Runner
//!
//! Daemon driving WAVES jobs on their execution backends.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Job store access (filesystem or HTTP)
//! - Services: Job lifecycle state machine
//! - Scheduler: Reconciliation loop and purge loop
//!
//! Both loops run until SIGINT or SIGTERM, finishing the job in progress
//! before exiting.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waves_runner::config::Config;
use waves_runner::repository;
use waves_runner::scheduler::{JobQueueDaemon, PurgeDaemon};
use waves_runner::service::{LifecycleService, StandardLifecycleService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waves_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WAVES Runner");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Loaded configuration: data_root={}, job_store={}",
        config.data_root.display(),
        config.job_store_url.as_deref().unwrap_or("filesystem")
    );

    let registry = Arc::new(config.registry()?);
    let keys: Vec<&str> = registry.classes().map(|class| class.key).collect();
    info!("Enabled adaptors: {}", keys.join(", "));

    let cipher = config.cipher().context("Failed to set up secret cipher")?;

    // Initialize repository and services
    let repository = repository::from_config(&config);
    let lifecycle: Arc<dyn LifecycleService> = Arc::new(StandardLifecycleService::new(
        Arc::clone(&repository),
        config.jobs_max_retry,
    ));

    info!("Services initialized");

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let queue = JobQueueDaemon::new(
        &config,
        Arc::clone(&repository),
        lifecycle,
        registry,
        cipher,
        shutdown.clone(),
    );
    let purge = PurgeDaemon::new(&config, repository, shutdown);

    info!(
        "Poll interval: {:?}, purge interval: {:?}, max retries: {}",
        config.poll_interval, config.purge_interval, config.jobs_max_retry
    );

    let (queue_result, purge_result) = tokio::join!(queue.run(), purge.run());
    if let Err(e) = &queue_result {
        error!("Job queue daemon error: {:#}", e);
    }
    if let Err(e) = &purge_result {
        error!("Purge daemon error: {:#}", e);
    }
    queue_result?;
    purge_result?;

    info!("WAVES Runner stopped");
    Ok(())
}

/// Cancels the token on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested, finishing current work");
    shutdown.cancel();
}
