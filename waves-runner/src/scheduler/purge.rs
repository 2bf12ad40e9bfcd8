//! Purge daemon
//!
//! Removes jobs, and their working directories, once they are past the
//! retention window matching their ownership.

use anyhow::{Context as AnyhowContext, Result};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::JobRepository;

pub struct PurgeDaemon {
    interval: Duration,
    anonymous_retention: chrono::Duration,
    registered_retention: chrono::Duration,
    repository: Arc<dyn JobRepository>,
    shutdown: CancellationToken,
}

impl PurgeDaemon {
    pub fn new(
        config: &Config,
        repository: Arc<dyn JobRepository>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            interval: config.purge_interval,
            anonymous_retention: config.anonymous_retention(),
            registered_retention: config.registered_retention(),
            repository,
            shutdown,
        }
    }

    /// Starts the purge loop, until shutdown is requested
    pub async fn run(&self) -> Result<()> {
        info!("Starting purge daemon (interval: {:?})", self.interval);

        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Err(e) = self.purge_once().await {
                error!("Error during purge: {:#}", e);
            }
        }

        info!("Purge daemon stopped");
        Ok(())
    }

    /// Deletes every expired job, returning how many were removed
    pub async fn purge_once(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let jobs = self
            .repository
            .expired_jobs(now - self.anonymous_retention, now - self.registered_retention)
            .await
            .context("Failed to fetch expired jobs")?;

        if jobs.is_empty() {
            debug!("No expired jobs");
            return Ok(0);
        }

        let mut removed = 0;
        for job in jobs {
            match self.repository.delete_job(job.id).await {
                Ok(()) => {
                    info!(
                        "Purged job {} '{}' (last update {})",
                        job.id, job.title, job.updated_at
                    );
                    removed += 1;
                }
                Err(e) => warn!("Failed to purge job {}: {}", job.id, e),
            }
        }

        info!("Purged {} expired job(s)", removed);
        Ok(removed)
    }
}
