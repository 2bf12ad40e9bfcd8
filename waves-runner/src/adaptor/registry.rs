//! Adaptor registry
//!
//! Maps stable adaptor keys to their parameter declarations and backend
//! factories. Unknown keys are rejected when the registry is restricted at
//! startup and when an envelope is unserialized.

use indexmap::IndexMap;
use secrecy::SecretString;
use std::path::PathBuf;
use waves_core::dto::adaptor::AdaptorEnvelope;

use super::backend::ExecutionBackend;
use super::config::{AdaptorConfig, AdaptorConfigParam, ConfigError};
use super::error::AdaptorError;
use super::queue::{self, PROTOCOLS};
use super::transport::{LocalTransport, SshAuth, SshTransport, Transport};
use super::{AdaptorBackend, JobAdaptor};
use crate::crypto::Cipher;

type BackendFactory = fn(&AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError>;

/// A registered adaptor class
pub struct AdaptorClass {
    pub key: &'static str,
    pub description: &'static str,
    params: fn() -> Vec<AdaptorConfigParam>,
    factory: BackendFactory,
}

impl AdaptorClass {
    pub fn new(
        key: &'static str,
        description: &'static str,
        params: fn() -> Vec<AdaptorConfigParam>,
        factory: BackendFactory,
    ) -> Self {
        Self {
            key,
            description,
            params,
            factory,
        }
    }

    /// Parameter declarations with class defaults
    pub fn init_params(&self) -> AdaptorConfig {
        AdaptorConfig::new((self.params)())
    }

    fn build(&self, config: AdaptorConfig) -> Result<JobAdaptor, AdaptorError> {
        let backend = (self.factory)(&config)?;
        Ok(JobAdaptor::new(self.key, config, backend))
    }
}

pub struct AdaptorRegistry {
    classes: IndexMap<&'static str, AdaptorClass>,
}

impl AdaptorRegistry {
    pub fn empty() -> Self {
        Self {
            classes: IndexMap::new(),
        }
    }

    /// Registry with every built-in adaptor class
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(AdaptorClass::new(
            "local-shell",
            "Local shell (fork)",
            local_shell_params,
            local_shell,
        ));
        registry.register(AdaptorClass::new(
            "ssh-shell",
            "Remote shell over SSH, password authentication",
            ssh_shell_params,
            ssh_shell,
        ));
        registry.register(AdaptorClass::new(
            "ssh-key-shell",
            "Remote shell over SSH, key authentication",
            ssh_key_shell_params,
            ssh_key_shell,
        ));
        registry.register(AdaptorClass::new(
            "local-cluster",
            "Cluster scheduler on the local host",
            local_cluster_params,
            local_cluster,
        ));
        registry.register(AdaptorClass::new(
            "ssh-cluster",
            "Cluster scheduler over SSH, password authentication",
            ssh_cluster_params,
            ssh_cluster,
        ));
        registry.register(AdaptorClass::new(
            "ssh-key-cluster",
            "Cluster scheduler over SSH, key authentication",
            ssh_key_cluster_params,
            ssh_key_cluster,
        ));
        registry
    }

    pub fn register(&mut self, class: AdaptorClass) {
        self.classes.insert(class.key, class);
    }

    /// Keeps only the given classes, failing on unknown keys
    pub fn restricted_to(mut self, keys: &[String]) -> Result<Self, AdaptorError> {
        if let Some(unknown) = keys.iter().find(|key| !self.classes.contains_key(key.as_str())) {
            return Err(AdaptorError::NotAvailable(unknown.clone()));
        }
        self.classes.retain(|key, _| keys.iter().any(|k| k.as_str() == *key));
        Ok(self)
    }

    pub fn classes(&self) -> impl Iterator<Item = &AdaptorClass> {
        self.classes.values()
    }

    pub fn class(&self, key: &str) -> Result<&AdaptorClass, AdaptorError> {
        self.classes
            .get(key)
            .ok_or_else(|| AdaptorError::NotAvailable(key.to_string()))
    }

    /// Builds an adaptor from runner-level values
    pub fn create<'a, I>(&self, key: &str, values: I) -> Result<JobAdaptor, AdaptorError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.create_with_overrides(key, values, [])
    }

    /// Builds an adaptor from runner-level values and per-job overrides
    pub fn create_with_overrides<'a, I, O>(
        &self,
        key: &str,
        values: I,
        overrides: O,
    ) -> Result<JobAdaptor, AdaptorError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        O: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let class = self.class(key)?;
        let mut config = class.init_params();
        config.configure(values)?;
        config.override_with(overrides)?;
        class.build(config)
    }

    /// Rebuilds the adaptor a job was configured with
    pub fn unserialize(
        &self,
        envelope: &AdaptorEnvelope,
        cipher: &Cipher,
    ) -> Result<JobAdaptor, AdaptorError> {
        let class = self.class(&envelope.clazz)?;
        let mut config = class.init_params();
        config.load_envelope_params(&envelope.params, cipher)?;
        class.build(config)
    }
}

impl Default for AdaptorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn common_params(protocol: AdaptorConfigParam, host: AdaptorConfigParam) -> Vec<AdaptorConfigParam> {
    vec![AdaptorConfigParam::new("command"), protocol, host]
}

fn ssh_params(mut params: Vec<AdaptorConfigParam>, key_auth: bool) -> Vec<AdaptorConfigParam> {
    params.push(AdaptorConfigParam::new("port").default_value("22"));
    params.push(AdaptorConfigParam::new("user"));
    if key_auth {
        params.push(AdaptorConfigParam::new("private_key"));
        params.push(AdaptorConfigParam::new("passphrase").encrypted().optional());
    } else {
        params.push(AdaptorConfigParam::new("password").encrypted());
    }
    params.push(AdaptorConfigParam::new("basedir").default_value(".waves"));
    params
}

fn cluster_params(mut params: Vec<AdaptorConfigParam>) -> Vec<AdaptorConfigParam> {
    params.push(AdaptorConfigParam::new("queue"));
    params
}

fn fork_protocol() -> AdaptorConfigParam {
    AdaptorConfigParam::new("protocol")
        .default_value("fork")
        .choices(&["fork"])
}

fn ssh_protocol() -> AdaptorConfigParam {
    AdaptorConfigParam::new("protocol")
        .default_value("ssh")
        .choices(&["ssh"])
}

fn scheduler_protocol() -> AdaptorConfigParam {
    AdaptorConfigParam::new("protocol")
        .default_value("sge")
        .choices(PROTOCOLS)
}

fn localhost() -> AdaptorConfigParam {
    AdaptorConfigParam::new("host").default_value("localhost")
}

fn remote_host() -> AdaptorConfigParam {
    AdaptorConfigParam::new("host")
}

fn local_shell_params() -> Vec<AdaptorConfigParam> {
    common_params(fork_protocol(), localhost())
}

fn ssh_shell_params() -> Vec<AdaptorConfigParam> {
    ssh_params(common_params(ssh_protocol(), remote_host()), false)
}

fn ssh_key_shell_params() -> Vec<AdaptorConfigParam> {
    ssh_params(common_params(ssh_protocol(), remote_host()), true)
}

fn local_cluster_params() -> Vec<AdaptorConfigParam> {
    cluster_params(common_params(scheduler_protocol(), localhost()))
}

fn ssh_cluster_params() -> Vec<AdaptorConfigParam> {
    cluster_params(ssh_params(
        common_params(scheduler_protocol(), remote_host()),
        false,
    ))
}

fn ssh_key_cluster_params() -> Vec<AdaptorConfigParam> {
    cluster_params(ssh_params(
        common_params(scheduler_protocol(), remote_host()),
        true,
    ))
}

fn local_transport(config: &AdaptorConfig) -> Box<dyn Transport> {
    Box::new(LocalTransport::new(
        config.value("host").unwrap_or("localhost"),
    ))
}

/// SSH transport from the configured values
///
/// Missing values are left empty: readiness is checked on connect.
fn ssh_transport(config: &AdaptorConfig, key_auth: bool) -> Result<Box<dyn Transport>, AdaptorError> {
    let port = config.value("port").unwrap_or("22");
    let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        name: "port".to_string(),
        reason: format!("'{}' is not a port number", port),
    })?;

    let auth = if key_auth {
        SshAuth::Key {
            private_key: PathBuf::from(config.value("private_key").unwrap_or_default()),
            passphrase: config.secret("passphrase").cloned(),
        }
    } else {
        SshAuth::Password(
            config
                .secret("password")
                .cloned()
                .unwrap_or_else(|| SecretString::from("")),
        )
    };

    Ok(Box::new(SshTransport::new(
        config.value("host").unwrap_or_default(),
        port,
        config.value("user").unwrap_or_default(),
        config.value("basedir").unwrap_or(".waves"),
        auth,
    )))
}

fn scheduler(config: &AdaptorConfig) -> Result<Box<dyn queue::QueueDescriptor>, AdaptorError> {
    queue::for_protocol(
        config.value("protocol").unwrap_or("sge"),
        config.value("queue").unwrap_or_default(),
    )
}

fn local_shell(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(local_transport(config), None)))
}

fn ssh_shell(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(ssh_transport(config, false)?, None)))
}

fn ssh_key_shell(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(ssh_transport(config, true)?, None)))
}

fn local_cluster(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(
        local_transport(config),
        Some(scheduler(config)?),
    )))
}

fn ssh_cluster(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(
        ssh_transport(config, false)?,
        Some(scheduler(config)?),
    )))
}

fn ssh_key_cluster(config: &AdaptorConfig) -> Result<Box<dyn AdaptorBackend>, AdaptorError> {
    Ok(Box::new(ExecutionBackend::new(
        ssh_transport(config, true)?,
        Some(scheduler(config)?),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_keys() {
        let registry = AdaptorRegistry::builtin();
        let keys: Vec<_> = registry.classes().map(|class| class.key).collect();
        assert_eq!(
            keys,
            vec![
                "local-shell",
                "ssh-shell",
                "ssh-key-shell",
                "local-cluster",
                "ssh-cluster",
                "ssh-key-cluster"
            ]
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let registry = AdaptorRegistry::builtin();
        assert!(matches!(
            registry.create("saga", []),
            Err(AdaptorError::NotAvailable(_))
        ));

        let restricted = AdaptorRegistry::builtin()
            .restricted_to(&["local-shell".to_string(), "nope".to_string()]);
        assert!(restricted.is_err());

        let restricted = AdaptorRegistry::builtin()
            .restricted_to(&["local-shell".to_string()])
            .unwrap();
        assert_eq!(restricted.classes().count(), 1);
    }

    #[test]
    fn test_init_params() {
        let registry = AdaptorRegistry::builtin();

        let local = registry.class("local-shell").unwrap().init_params();
        assert_eq!(local.missing(), vec!["command"]);
        assert!(local.get("protocol").unwrap().prevent_override);

        let ssh = registry.class("ssh-key-cluster").unwrap().init_params();
        assert_eq!(ssh.missing(), vec!["command", "host", "user", "private_key", "queue"]);
        assert!(ssh.get("passphrase").unwrap().encrypted);
        assert_eq!(ssh.value("port"), Some("22"));
    }

    #[test]
    fn test_cluster_protocol_is_fixed_per_job() {
        let registry = AdaptorRegistry::builtin();

        let adaptor = registry
            .create(
                "local-cluster",
                [("command", "blastp"), ("protocol", "slurm"), ("queue", "short")],
            )
            .unwrap();
        assert_eq!(adaptor.connexion_string(), "slurm://localhost");

        let result = registry.create_with_overrides(
            "local-cluster",
            [("command", "blastp"), ("queue", "short")],
            [("protocol", "lsf")],
        );
        assert!(matches!(
            result,
            Err(AdaptorError::Config(ConfigError::OverrideForbidden(_)))
        ));
    }

    #[test]
    fn test_serialize_roundtrip_keeps_secret_encrypted() {
        let registry = AdaptorRegistry::builtin();
        let cipher = Cipher::random();
        let adaptor = registry
            .create(
                "ssh-shell",
                [
                    ("command", "blastp"),
                    ("host", "cluster.example.org"),
                    ("user", "waves"),
                    ("password", "hunter2"),
                ],
            )
            .unwrap();

        let envelope = adaptor.serialize(&cipher);
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""clazz":"ssh-shell""#));
        assert!(!json.contains("hunter2"));

        let restored = registry.unserialize(&envelope, &cipher).unwrap();
        assert_eq!(restored.clazz(), "ssh-shell");
        assert_eq!(restored.connexion_string(), "ssh://cluster.example.org:22");
        assert_eq!(
            restored.config().secret("password").map(crate::adaptor::config::expose),
            Some("hunter2")
        );
        assert_eq!(restored.dump_config(), adaptor.dump_config());
    }

    #[test]
    fn test_unserialize_rejects_unknown_class() {
        let registry = AdaptorRegistry::builtin();
        let envelope = AdaptorEnvelope {
            clazz: "waves.adaptors.saga.Unknown".to_string(),
            params: Default::default(),
        };
        assert!(registry.unserialize(&envelope, &Cipher::random()).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let registry = AdaptorRegistry::builtin();
        let result = registry.create("ssh-shell", [("port", "ssh")]);
        assert!(matches!(
            result,
            Err(AdaptorError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
