//! Runner configuration
//!
//! Defines all configurable parameters for the runner including daemon
//! intervals, retry and retention policies, the job store location and the
//! key protecting secret adaptor parameters.

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;

use crate::adaptor::AdaptorRegistry;
use crate::crypto::{Cipher, KEY_LEN};

/// Runner configuration
///
/// Built once at process start and passed explicitly to whatever needs it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory, jobs live under `<root>/jobs/<id>`
    pub data_root: PathBuf,

    /// Web layer base URL; when set jobs are stored over HTTP
    pub job_store_url: Option<String>,

    /// Sleep between two reconciliation ticks
    pub poll_interval: Duration,

    /// Sleep between two purge passes
    pub purge_interval: Duration,

    /// Consecutive failures tolerated before a job is set in error
    pub jobs_max_retry: u32,

    /// Retention of jobs without an owning client, in days
    pub keep_anonymous_jobs: u32,

    /// Retention of jobs owned by a registered client, in days
    pub keep_registered_jobs: u32,

    /// Key for encrypted adaptor parameters
    pub secret_key: Option<SecretString>,

    /// Enabled adaptor classes, all registered ones when empty
    pub adaptors: Vec<String>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            job_store_url: None,
            poll_interval: Duration::from_secs(5),
            purge_interval: Duration::from_secs(86_400),
            jobs_max_retry: 5,
            keep_anonymous_jobs: 30,
            keep_registered_jobs: 120,
            secret_key: None,
            adaptors: Vec::new(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WAVES_DATA_ROOT (required)
    /// - WAVES_JOB_STORE_URL (optional)
    /// - WAVES_POLL_INTERVAL (optional, seconds, default: 5)
    /// - WAVES_PURGE_INTERVAL (optional, seconds, default: 86400)
    /// - WAVES_JOBS_MAX_RETRY (optional, default: 5)
    /// - WAVES_KEEP_ANONYMOUS_JOBS (optional, days, default: 30)
    /// - WAVES_KEEP_REGISTERED_JOBS (optional, days, default: 120)
    /// - WAVES_SECRET_KEY (optional, 32 characters)
    /// - WAVES_ADAPTORS (optional, comma separated adaptor keys)
    pub fn from_env() -> anyhow::Result<Self> {
        let data_root = std::env::var("WAVES_DATA_ROOT")
            .map_err(|_| anyhow::anyhow!("WAVES_DATA_ROOT environment variable not set"))?;

        let job_store_url = std::env::var("WAVES_JOB_STORE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let poll_interval = std::env::var("WAVES_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let purge_interval = std::env::var("WAVES_PURGE_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(86_400));

        let jobs_max_retry = std::env::var("WAVES_JOBS_MAX_RETRY")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let keep_anonymous_jobs = std::env::var("WAVES_KEEP_ANONYMOUS_JOBS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(30);

        let keep_registered_jobs = std::env::var("WAVES_KEEP_REGISTERED_JOBS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(120);

        let secret_key = std::env::var("WAVES_SECRET_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::from);

        let adaptors = std::env::var("WAVES_ADAPTORS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            data_root: PathBuf::from(data_root),
            job_store_url,
            poll_interval,
            purge_interval,
            jobs_max_retry,
            keep_anonymous_jobs,
            keep_registered_jobs,
            secret_key,
            adaptors,
        })
    }

    /// Loads configuration from the environment, falling back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let config = match Self::from_env() {
            Ok(config) => config,
            Err(e) => {
                tracing::info!("Failed to load config from environment ({}), using defaults", e);
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_root.as_os_str().is_empty() {
            anyhow::bail!("data_root cannot be empty");
        }

        if let Some(url) = &self.job_store_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("job_store_url must start with http:// or https://");
            }
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.purge_interval.as_secs() == 0 {
            anyhow::bail!("purge_interval must be greater than 0");
        }

        if self.keep_anonymous_jobs == 0 || self.keep_registered_jobs == 0 {
            anyhow::bail!("job retention windows must be at least one day");
        }

        if let Some(key) = &self.secret_key {
            let len = key.expose_secret().len();
            if len != KEY_LEN {
                anyhow::bail!("secret_key must be {} characters long, got {}", KEY_LEN, len);
            }
        }

        self.registry()?;

        Ok(())
    }

    /// Cipher for secret adaptor parameters
    ///
    /// Without a configured key a random one is used, so secrets serialized
    /// by this process cannot be read back after a restart.
    pub fn cipher(&self) -> anyhow::Result<Cipher> {
        match &self.secret_key {
            Some(key) => Ok(Cipher::from_key(key.expose_secret())?),
            None => {
                tracing::warn!("WAVES_SECRET_KEY not set, using a random key for this process");
                Ok(Cipher::random())
            }
        }
    }

    /// Adaptor registry restricted to the enabled classes
    pub fn registry(&self) -> anyhow::Result<AdaptorRegistry> {
        let registry = AdaptorRegistry::builtin();
        if self.adaptors.is_empty() {
            return Ok(registry);
        }
        Ok(registry.restricted_to(&self.adaptors)?)
    }

    pub fn anonymous_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.keep_anonymous_jobs))
    }

    pub fn registered_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.keep_registered_jobs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("/tmp/waves")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.purge_interval, Duration::from_secs(86_400));
        assert_eq!(config.jobs_max_retry, 5);
        assert_eq!(config.keep_anonymous_jobs, 30);
        assert_eq!(config.keep_registered_jobs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Invalid URL should fail
        config.job_store_url = Some("not-a-url".to_string());
        assert!(config.validate().is_err());

        config.job_store_url = Some("http://localhost:8000".to_string());
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());
        config.poll_interval = Duration::from_secs(5);

        config.keep_anonymous_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_length() {
        let mut config = Config::default();

        config.secret_key = Some(SecretString::from("too short"));
        assert!(config.validate().is_err());

        config.secret_key = Some(SecretString::from("0123456789abcdef0123456789abcdef"));
        assert!(config.validate().is_ok());
        assert!(config.cipher().is_ok());
    }

    #[test]
    fn test_unknown_adaptor_is_rejected() {
        let mut config = Config::default();

        config.adaptors = vec!["local-shell".to_string(), "ssh-cluster".to_string()];
        assert_eq!(config.registry().unwrap().classes().count(), 2);

        config.adaptors.push("globus".to_string());
        assert!(config.validate().is_err());
    }
}
