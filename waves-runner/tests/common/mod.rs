//! Shared fixtures for the lifecycle tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use waves_core::domain::{Job, JobStatus};
use waves_runner::adaptor::{AdaptorBackend, AdaptorConfig, AdaptorConfigParam, AdaptorError, JobAdaptor};
use waves_runner::repository::FsJobRepository;
use waves_runner::service::StandardLifecycleService;

/// Backend answering from a script, counting the calls it receives
#[derive(Default)]
pub struct ScriptedBackend {
    pub prepare_failures: u32,
    pub cancel_fails: bool,
    /// Statuses returned by successive polls, the last one repeats
    pub statuses: Mutex<Vec<JobStatus>>,
    pub prepare_calls: Arc<AtomicU32>,
}

impl ScriptedBackend {
    pub fn with_statuses(statuses: &[JobStatus]) -> Self {
        Self {
            statuses: Mutex::new(statuses.to_vec()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AdaptorBackend for ScriptedBackend {
    fn host(&self) -> &str {
        "scripted"
    }

    fn port(&self) -> Option<u16> {
        None
    }

    async fn connect(&mut self) -> Result<(), AdaptorError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), AdaptorError> {
        Ok(())
    }

    async fn prepare(&mut self, _job: &Job, _command_line: &str) -> Result<(), AdaptorError> {
        let calls = self.prepare_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if calls <= self.prepare_failures {
            Err(AdaptorError::job("staging failed"))
        } else {
            Ok(())
        }
    }

    async fn run(&mut self, _job: &Job) -> Result<String, AdaptorError> {
        Ok("4242".to_string())
    }

    async fn cancel(&mut self, _job: &Job) -> Result<(), AdaptorError> {
        if self.cancel_fails {
            Err(AdaptorError::job("qdel: job is owned by another user"))
        } else {
            Ok(())
        }
    }

    async fn status(&mut self, _job: &Job) -> Result<JobStatus, AdaptorError> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses.first().copied().unwrap_or(JobStatus::Running)
        };
        Ok(status)
    }

    async fn results(&mut self, _job: &Job) -> Result<i32, AdaptorError> {
        Ok(0)
    }
}

pub fn scripted_adaptor(backend: ScriptedBackend) -> JobAdaptor {
    let mut config = AdaptorConfig::new([
        AdaptorConfigParam::new("command"),
        AdaptorConfigParam::new("protocol").default_value("scripted"),
    ]);
    config.configure([("command", "true")]).unwrap();
    JobAdaptor::new("scripted", config, Box::new(backend))
}

pub fn lifecycle(root: &Path, max_retries: u32) -> (StandardLifecycleService, Arc<FsJobRepository>) {
    let repository = Arc::new(FsJobRepository::new(root));
    let service = StandardLifecycleService::new(repository.clone(), max_retries);
    (service, repository)
}
