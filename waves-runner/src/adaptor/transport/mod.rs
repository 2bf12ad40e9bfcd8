//! Transports
//!
//! A transport knows how to reach the execution host: run shell commands
//! there and move job files back and forth. Scheduling concerns live in
//! [`crate::adaptor::queue`].

mod local;
mod ssh;

pub use local::LocalTransport;
pub use ssh::{SshAuth, SshTransport};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use waves_core::domain::Job;

use crate::adaptor::error::AdaptorError;

/// Captured result of a command run on the execution host
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Converts a failed run into a job error
    pub fn check(self, what: &str) -> Result<Self, AdaptorError> {
        if self.success() {
            return Ok(self);
        }
        let detail = match self.stderr.trim() {
            "" => format!("exit code {:?}", self.code),
            stderr => stderr.to_string(),
        };
        Err(AdaptorError::job(format!("{} failed: {}", what, detail)))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn host(&self) -> &str;

    fn port(&self) -> Option<u16> {
        None
    }

    async fn connect(&mut self) -> Result<(), AdaptorError>;

    /// Safe to call when not connected
    async fn disconnect(&mut self) -> Result<(), AdaptorError>;

    /// Directory the job runs in on the execution host
    fn job_dir(&self, job: &Job) -> PathBuf;

    /// Runs a shell command inside `dir` on the execution host
    async fn exec(&self, command: &str, dir: &Path) -> Result<CommandOutput, AdaptorError>;

    /// Copies the named files from the local working directory to the job dir
    async fn upload(&self, job: &Job, files: &[String]) -> Result<(), AdaptorError>;

    /// Copies the job dir back into the local working directory
    async fn download(&self, job: &Job) -> Result<(), AdaptorError>;
}

/// Quotes one word for a POSIX shell
pub fn quote(word: &str) -> Result<String, AdaptorError> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| AdaptorError::job(format!("cannot quote '{}': {}", word, e)))
}

/// Prefixes a command with a `cd` into `dir`
pub fn in_dir(dir: &Path, command: &str) -> Result<String, AdaptorError> {
    Ok(format!("cd {} && {}", quote(&dir.to_string_lossy())?, command))
}
