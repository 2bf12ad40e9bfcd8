//! Job queue daemon
//!
//! Reconciliation loop: every tick loads the pending jobs and moves each of
//! them forward by one lifecycle action. Jobs are processed one at a time,
//! each with its own adaptor, disconnected before moving to the next job.

use anyhow::{Context as AnyhowContext, Result};
use std::fmt;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use waves_core::domain::{Job, JobStatus};

use crate::adaptor::{AdaptorError, AdaptorRegistry, JobAdaptor};
use crate::config::Config;
use crate::crypto::Cipher;
use crate::repository::JobRepository;
use crate::service::{LifecycleError, LifecycleService, StepOutcome};

/// Counters of one reconciliation tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub processed: usize,
    pub advanced: usize,
    pub unchanged: usize,
    pub retried: usize,
    pub failed: usize,
    pub errors: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Advanced(_) => self.advanced += 1,
            StepOutcome::Unchanged(_) | StepOutcome::CancelRefused(_) => self.unchanged += 1,
            StepOutcome::Retrying { .. } => self.retried += 1,
            StepOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} advanced, {} unchanged, {} retrying, {} failed, {} errors",
            self.processed, self.advanced, self.unchanged, self.retried, self.failed, self.errors
        )
    }
}

/// Reconciliation daemon driving pending jobs
pub struct JobQueueDaemon {
    poll_interval: Duration,
    repository: Arc<dyn JobRepository>,
    lifecycle: Arc<dyn LifecycleService>,
    registry: Arc<AdaptorRegistry>,
    cipher: Cipher,
    shutdown: CancellationToken,
}

impl JobQueueDaemon {
    /// Creates a new job queue daemon
    pub fn new(
        config: &Config,
        repository: Arc<dyn JobRepository>,
        lifecycle: Arc<dyn LifecycleService>,
        registry: Arc<AdaptorRegistry>,
        cipher: Cipher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            poll_interval: config.poll_interval,
            repository,
            lifecycle,
            registry,
            cipher,
            shutdown,
        }
    }

    /// Starts the reconciliation loop, until shutdown is requested
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting job queue daemon (interval: {:?})",
            self.poll_interval
        );

        let mut interval = time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            debug!("Reconciling pending jobs");

            match self.tick().await {
                Ok(summary) => {
                    if summary.processed > 0 {
                        info!("Queue tick: {}", summary);
                    }
                }
                Err(e) => {
                    error!("Error during queue tick: {:#}", e);
                }
            }
        }

        info!("Job queue daemon stopped");
        Ok(())
    }

    /// Performs a single reconciliation pass
    ///
    /// Stops early, between two jobs, once shutdown is requested.
    pub async fn tick(&self) -> Result<TickSummary> {
        let jobs = self
            .repository
            .pending_jobs()
            .await
            .context("Failed to fetch pending jobs")?;

        let mut summary = TickSummary::default();
        if jobs.is_empty() {
            debug!("No pending jobs");
            return Ok(summary);
        }

        info!("Found {} pending job(s)", jobs.len());

        for mut job in jobs {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, leaving remaining jobs for the next run");
                break;
            }

            summary.processed += 1;
            match self.process_job(&mut job).await {
                Ok(outcome) => {
                    debug!("Job {}: {:?}", job.id, outcome);
                    summary.record(&outcome);
                }
                Err(e) => {
                    summary.errors += 1;
                    error!("Failed to process job {}: {:#}", job.id, e);
                }
            }
        }

        Ok(summary)
    }

    /// Runs one lifecycle action on a job
    async fn process_job(&self, job: &mut Job) -> Result<StepOutcome> {
        let mut adaptor = match self.adaptor_for(job) {
            Ok(adaptor) => adaptor,
            Err(e) => return self.fail(job, format!("No usable adaptor: {}", e)).await,
        };

        let result = self.lifecycle.step(job, &mut adaptor).await;

        if let Err(e) = adaptor.disconnect().await {
            warn!(
                "Failed to disconnect from {} after job {}: {}",
                adaptor.connexion_string(),
                job.id,
                e
            );
        }

        match result {
            Ok(outcome) => Ok(outcome),
            // never retried, the job cannot make progress anymore
            Err(LifecycleError::Adaptor(e)) => self.fail(job, e.to_string()).await,
            Err(e) => Err(e.into()),
        }
    }

    fn adaptor_for(&self, job: &Job) -> Result<JobAdaptor, AdaptorError> {
        let envelope = job
            .adaptor_config
            .as_ref()
            .ok_or_else(|| AdaptorError::NotAvailable("job has no adaptor".to_string()))?;
        self.registry.unserialize(envelope, &self.cipher)
    }

    async fn fail(&self, job: &mut Job, reason: String) -> Result<StepOutcome> {
        error!("Job {} set in error: {}", job.id, reason);
        job.set_status(JobStatus::Error, reason.clone());
        self.repository
            .save_job(job)
            .await
            .context("Failed to save failed job")?;
        Ok(StepOutcome::Failed(reason))
    }
}
