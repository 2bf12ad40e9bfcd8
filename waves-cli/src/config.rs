//! Configuration module
//!
//! The CLI reads the same environment as the runner, so that it sees the
//! same job store, adaptors and secret key. Command-line flags take
//! precedence over the environment.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use waves_runner::adaptor::{AdaptorRegistry, JobAdaptor};
use waves_runner::config::Config as RunnerConfig;
use waves_runner::crypto::Cipher;
use waves_runner::repository::{self, JobRepository};
use waves_runner::service::{LifecycleService, StandardLifecycleService};
use waves_core::domain::Job;

/// CLI configuration
pub struct Config {
    pub runner: RunnerConfig,
    pub repository: Arc<dyn JobRepository>,
    pub registry: Arc<AdaptorRegistry>,
    pub cipher: Cipher,
}

impl Config {
    pub fn load(data_root: Option<PathBuf>, job_store_url: Option<String>) -> Result<Self> {
        let mut runner = RunnerConfig::load()?;
        if let Some(data_root) = data_root {
            runner.data_root = data_root;
        }
        if job_store_url.is_some() {
            runner.job_store_url = job_store_url;
        }
        runner.validate()?;

        Ok(Self {
            repository: repository::from_config(&runner),
            registry: Arc::new(runner.registry()?),
            cipher: runner.cipher()?,
            runner,
        })
    }

    pub fn lifecycle(&self) -> Arc<dyn LifecycleService> {
        Arc::new(StandardLifecycleService::new(
            Arc::clone(&self.repository),
            self.runner.jobs_max_retry,
        ))
    }

    /// Adaptor a job was configured with
    pub fn job_adaptor(&self, job: &Job) -> Result<JobAdaptor> {
        let envelope = job
            .adaptor_config
            .as_ref()
            .with_context(|| format!("Job {} has no adaptor configuration", job.id))?;
        self.registry
            .unserialize(envelope, &self.cipher)
            .with_context(|| format!("Failed to restore adaptor '{}'", envelope.clazz))
    }

    /// Adaptor built from a class key and `key=value` parameters
    pub fn adaptor(&self, clazz: &str, params: &[(String, String)]) -> Result<JobAdaptor> {
        self.registry
            .create(
                clazz,
                params.iter().map(|(key, value)| (key.as_str(), value.as_str())),
            )
            .with_context(|| format!("Failed to configure adaptor '{}'", clazz))
    }
}
