//! Local transport
//!
//! Runs commands with the local `sh`. Jobs run directly in their working
//! directory, so there is nothing to stage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;
use waves_core::domain::Job;

use super::{CommandOutput, Transport};
use crate::adaptor::error::AdaptorError;

pub struct LocalTransport {
    host: String,
}

impl LocalTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn host(&self) -> &str {
        &self.host
    }

    async fn connect(&mut self) -> Result<(), AdaptorError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), AdaptorError> {
        Ok(())
    }

    fn job_dir(&self, job: &Job) -> PathBuf {
        job.working_directory.clone()
    }

    async fn exec(&self, command: &str, dir: &Path) -> Result<CommandOutput, AdaptorError> {
        debug!("Running locally in {}: {}", dir.display(), command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| AdaptorError::job(format!("failed to run '{}': {}", command, e)))?;

        let output = CommandOutput::from_output(output);
        debug!(
            "Local command exited with {:?}, stdout: {}, stderr: {}",
            output.code,
            output.stdout.trim(),
            output.stderr.trim()
        );
        Ok(output)
    }

    async fn upload(&self, job: &Job, files: &[String]) -> Result<(), AdaptorError> {
        for file in files {
            let path = job.working_directory.join(file);
            if !tokio::fs::try_exists(&path).await? {
                return Err(AdaptorError::job(format!(
                    "input file '{}' not found in working directory",
                    file
                )));
            }
        }
        Ok(())
    }

    async fn download(&self, _job: &Job) -> Result<(), AdaptorError> {
        Ok(())
    }
}
