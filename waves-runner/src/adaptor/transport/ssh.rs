//! SSH transport
//!
//! One `russh` session per adaptor connection. Commands run on exec
//! channels of that session, job files move over an SFTP subsystem channel.
//!
//! Host keys are checked against the user's `known_hosts`: a changed key is
//! rejected, an unknown host is accepted with a warning.

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use waves_core::domain::Job;

use super::{CommandOutput, Transport, in_dir, quote};
use crate::adaptor::config::expose;
use crate::adaptor::error::AdaptorError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// How to authenticate against the remote host
#[derive(Debug, Clone)]
pub enum SshAuth {
    Password(SecretString),
    Key {
        private_key: PathBuf,
        passphrase: Option<SecretString>,
    },
}

struct HostKeyCheck {
    host: String,
    port: u16,
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(
                    "Host {}:{} is not in known_hosts, accepting its key",
                    self.host, self.port
                );
                Ok(true)
            }
            Err(e) => {
                warn!("Rejecting host key of {}:{}: {}", self.host, self.port, e);
                Ok(false)
            }
        }
    }
}

pub struct SshTransport {
    host: String,
    port: u16,
    user: String,
    basedir: PathBuf,
    auth: SshAuth,
    session: Option<Handle<HostKeyCheck>>,
}

impl SshTransport {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        basedir: impl Into<PathBuf>,
        auth: SshAuth,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            basedir: basedir.into(),
            auth,
            session: None,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    fn session(&self) -> Result<&Handle<HostKeyCheck>, AdaptorError> {
        self.session
            .as_ref()
            .ok_or_else(|| AdaptorError::Connect(format!("not connected to {}", self.host)))
    }

    fn connect_error(&self, e: impl std::fmt::Display) -> AdaptorError {
        AdaptorError::Connect(format!("ssh to {} failed: {}", self.destination(), e))
    }

    async fn authenticate(&self, session: &mut Handle<HostKeyCheck>) -> Result<(), AdaptorError> {
        let result = match &self.auth {
            SshAuth::Password(password) => session
                .authenticate_password(self.user.as_str(), expose(password))
                .await
                .map_err(|e| self.connect_error(e))?,
            SshAuth::Key {
                private_key,
                passphrase,
            } => {
                let key = load_secret_key(private_key, passphrase.as_ref().map(expose))
                    .map_err(|e| {
                        AdaptorError::Connect(format!(
                            "cannot load private key {}: {}",
                            private_key.display(),
                            e
                        ))
                    })?;
                let hash = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|e| self.connect_error(e))?
                    .flatten();
                session
                    .authenticate_publickey(
                        self.user.as_str(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash),
                    )
                    .await
                    .map_err(|e| self.connect_error(e))?
            }
        };

        if !result.success() {
            return Err(AdaptorError::Connect(format!(
                "authentication to {} rejected",
                self.destination()
            )));
        }
        Ok(())
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, AdaptorError> {
        let session = self.session()?;
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| AdaptorError::Connect(format!("lost connection to {}: {}", self.host, e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| AdaptorError::job(format!("exec on {} failed: {}", self.host, e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut code = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // extended data type 1 is stderr
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => code = Some(exit_status as i32),
                _ => {}
            }
        }

        Ok(CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn sftp(&self) -> Result<SftpSession, AdaptorError> {
        let channel = self
            .session()?
            .channel_open_session()
            .await
            .map_err(|e| AdaptorError::Connect(format!("lost connection to {}: {}", self.host, e)))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| AdaptorError::job(format!("sftp subsystem on {}: {}", self.host, e)))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| AdaptorError::job(format!("sftp session on {}: {}", self.host, e)))
    }
}

fn remote(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn sftp_error(what: &str, path: &Path, e: impl std::fmt::Display) -> AdaptorError {
    AdaptorError::job(format!("{} of '{}' failed: {}", what, path.display(), e))
}

#[async_trait]
impl Transport for SshTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> Option<u16> {
        Some(self.port)
    }

    async fn connect(&mut self) -> Result<(), AdaptorError> {
        if self.session.is_some() {
            return Ok(());
        }

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        });
        let handler = HostKeyCheck {
            host: self.host.clone(),
            port: self.port,
        };

        let connecting = client::connect(config, (self.host.as_str(), self.port), handler);
        let mut session = tokio::time::timeout(CONNECT_TIMEOUT, connecting)
            .await
            .map_err(|_| self.connect_error("timed out"))?
            .map_err(|e| self.connect_error(e))?;

        self.authenticate(&mut session).await?;
        info!("Opened SSH session to {}:{}", self.host, self.port);

        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), AdaptorError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        match session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            Ok(()) => debug!("Closed SSH session to {}", self.host),
            Err(e) => warn!("Failed to close SSH session to {}: {}", self.host, e),
        }
        Ok(())
    }

    fn job_dir(&self, job: &Job) -> PathBuf {
        self.basedir.join(job.id.to_string())
    }

    async fn exec(&self, command: &str, dir: &Path) -> Result<CommandOutput, AdaptorError> {
        let command = in_dir(dir, command)?;
        debug!("Running on {}: {}", self.host, command);
        self.run(&command).await
    }

    async fn upload(&self, job: &Job, files: &[String]) -> Result<(), AdaptorError> {
        let remote_dir = self.job_dir(job);

        let mut dirs = vec![quote(&remote(&remote_dir))?];
        for file in files {
            if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
                dirs.push(quote(&remote(&remote_dir.join(parent)))?);
            }
        }
        self.run(&format!("mkdir -p {}", dirs.join(" ")))
            .await?
            .check("creating remote job directory")?;

        let sftp = self.sftp().await?;
        for file in files {
            let local = job.working_directory.join(file);
            let target = remote_dir.join(file);
            debug!("Uploading {} to {}:{}", local.display(), self.host, target.display());

            let content = tokio::fs::read(&local).await?;
            let mut handle = sftp
                .create(remote(&target))
                .await
                .map_err(|e| sftp_error("upload", &target, e))?;
            handle
                .write_all(&content)
                .await
                .map_err(|e| sftp_error("upload", &target, e))?;
            handle
                .shutdown()
                .await
                .map_err(|e| sftp_error("upload", &target, e))?;
        }

        if let Err(e) = sftp.close().await {
            debug!("Closing sftp session on {}: {}", self.host, e);
        }
        Ok(())
    }

    async fn download(&self, job: &Job) -> Result<(), AdaptorError> {
        let remote_dir = self.job_dir(job);
        let sftp = self.sftp().await?;

        let mut pending = vec![(remote_dir.clone(), job.working_directory.clone())];
        while let Some((from, to)) = pending.pop() {
            tokio::fs::create_dir_all(&to).await?;
            let entries = sftp
                .read_dir(remote(&from))
                .await
                .map_err(|e| sftp_error("listing", &from, e))?;

            for entry in entries {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    continue;
                }
                let source = from.join(&name);
                let target = to.join(&name);

                if entry.file_type().is_dir() {
                    pending.push((source, target));
                    continue;
                }

                let mut handle = sftp
                    .open(remote(&source))
                    .await
                    .map_err(|e| sftp_error("download", &source, e))?;
                let mut content = Vec::new();
                handle
                    .read_to_end(&mut content)
                    .await
                    .map_err(|e| sftp_error("download", &source, e))?;
                tokio::fs::write(&target, content).await?;
            }
        }

        if let Err(e) = sftp.close().await {
            debug!("Closing sftp session on {}: {}", self.host, e);
        }
        debug!(
            "Downloaded {}:{} to {}",
            self.host,
            remote_dir.display(),
            job.working_directory.display()
        );
        Ok(())
    }
}
