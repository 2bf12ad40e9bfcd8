//! Adaptor configuration parameters
//!
//! Each adaptor owns an ordered set of named parameters. Values are layered:
//! class defaults, then runner-level configuration, then per-job overrides.
//! Parameters flagged `prevent_override` can only be set at runner level and
//! `encrypted` parameters only ever hold a [`SecretString`].

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::crypto::Cipher;

/// Placeholder shown instead of secret values
pub const MASK: &str = "********";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown parameter '{0}'")]
    UnknownParam(String),

    #[error("parameter '{0}' cannot be overridden")]
    OverrideForbidden(String),

    #[error("invalid value '{value}' for '{name}', expected one of: {}", .choices.join(", "))]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("secret key must be 32 characters long, got {0}")]
    InvalidKey(usize),

    #[error("failed to decrypt secret parameter")]
    Decrypt,
}

/// Value of a configuration parameter
#[derive(Debug, Clone)]
pub enum ParamValue {
    Plain(String),
    Secret(SecretString),
}

impl ParamValue {
    /// Value as displayed in diagnostics
    pub fn display(&self) -> &str {
        match self {
            ParamValue::Plain(value) => value,
            ParamValue::Secret(_) => MASK,
        }
    }
}

/// A named configuration value bound to one adaptor
#[derive(Debug, Clone)]
pub struct AdaptorConfigParam {
    pub name: String,
    pub value: Option<ParamValue>,
    pub encrypted: bool,
    pub prevent_override: bool,
    /// Allowed values, empty when free-form
    pub choices: Vec<String>,
    /// A missing required value makes the adaptor not ready
    pub required: bool,
}

impl AdaptorConfigParam {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            encrypted: false,
            prevent_override: false,
            choices: Vec::new(),
            required: true,
        }
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.value = Some(ParamValue::Plain(value.to_string()));
        self
    }

    /// Marks the parameter as secret
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts the value to a fixed list, settable at runner level only
    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self.prevent_override = true;
        self
    }

    fn assign(&mut self, value: &str) -> Result<(), ConfigError> {
        if !self.choices.is_empty() && !self.choices.iter().any(|c| c == value) {
            return Err(ConfigError::InvalidChoice {
                name: self.name.clone(),
                value: value.to_string(),
                choices: self.choices.clone(),
            });
        }
        self.value = Some(if self.encrypted {
            ParamValue::Secret(SecretString::from(value.to_string()))
        } else {
            ParamValue::Plain(value.to_string())
        });
        Ok(())
    }
}

/// Ordered parameter set of one adaptor instance
#[derive(Debug, Clone, Default)]
pub struct AdaptorConfig {
    params: IndexMap<String, AdaptorConfigParam>,
}

impl AdaptorConfig {
    pub fn new(params: impl IntoIterator<Item = AdaptorConfigParam>) -> Self {
        Self {
            params: params
                .into_iter()
                .map(|param| (param.name.clone(), param))
                .collect(),
        }
    }

    /// Sets runner-level values; any declared parameter may be set
    pub fn configure<'a, I>(&mut self, values: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in values {
            self.param_mut(name)?.assign(value)?;
        }
        Ok(())
    }

    /// Applies per-job overrides, rejecting parameters fixed by the class
    pub fn override_with<'a, I>(&mut self, values: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in values {
            let param = self.param_mut(name)?;
            if param.prevent_override {
                return Err(ConfigError::OverrideForbidden(name.to_string()));
            }
            param.assign(value)?;
        }
        Ok(())
    }

    /// Required parameters without a value
    pub fn missing(&self) -> Vec<String> {
        self.params
            .values()
            .filter(|param| param.required && param.value.is_none())
            .map(|param| param.name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&AdaptorConfigParam> {
        self.params.get(name)
    }

    /// Plain value of a parameter
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.params.get(name)?.value.as_ref()? {
            ParamValue::Plain(value) => Some(value),
            ParamValue::Secret(_) => None,
        }
    }

    /// Secret value of an encrypted parameter
    pub fn secret(&self, name: &str) -> Option<&SecretString> {
        match self.params.get(name)?.value.as_ref()? {
            ParamValue::Secret(secret) => Some(secret),
            ParamValue::Plain(_) => None,
        }
    }

    pub fn params(&self) -> impl Iterator<Item = &AdaptorConfigParam> {
        self.params.values()
    }

    /// Resolved values for the serialized envelope, secrets encrypted
    pub fn to_envelope_params(&self, cipher: &Cipher) -> BTreeMap<String, Option<String>> {
        self.params
            .values()
            .map(|param| {
                let value = param.value.as_ref().map(|value| match value {
                    ParamValue::Plain(plain) => plain.clone(),
                    ParamValue::Secret(secret) => cipher.encrypt(secret),
                });
                (param.name.clone(), value)
            })
            .collect()
    }

    /// Restores values from a serialized envelope
    ///
    /// Envelope values are trusted: they were resolved when the adaptor was
    /// first configured, so `prevent_override` does not apply here.
    pub fn load_envelope_params(
        &mut self,
        params: &BTreeMap<String, Option<String>>,
        cipher: &Cipher,
    ) -> Result<(), ConfigError> {
        for (name, value) in params {
            let param = self.param_mut(name)?;
            match value {
                None => param.value = None,
                Some(stored) if param.encrypted => {
                    param.value = Some(ParamValue::Secret(cipher.decrypt(stored)?));
                }
                Some(plain) => param.assign(plain)?,
            }
        }
        Ok(())
    }

    /// Text dump with secrets masked
    pub fn dump(&self) -> String {
        self.params
            .values()
            .map(|param| {
                let value = param.value.as_ref().map(ParamValue::display).unwrap_or("-");
                format!("{}: {}", param.name, value)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn param_mut(&mut self, name: &str) -> Result<&mut AdaptorConfigParam, ConfigError> {
        self.params
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownParam(name.to_string()))
    }
}

/// Exposes a secret for a child process environment
pub(crate) fn expose(secret: &SecretString) -> &str {
    secret.expose_secret()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_config() -> AdaptorConfig {
        AdaptorConfig::new([
            AdaptorConfigParam::new("command"),
            AdaptorConfigParam::new("protocol")
                .default_value("ssh")
                .choices(&["ssh"]),
            AdaptorConfigParam::new("host"),
            AdaptorConfigParam::new("port").default_value("22"),
            AdaptorConfigParam::new("password").encrypted(),
        ])
    }

    #[test]
    fn test_missing_lists_required_params_in_order() {
        let config = ssh_config();
        assert_eq!(config.missing(), vec!["command", "host", "password"]);
    }

    #[test]
    fn test_configure_then_override() {
        let mut config = ssh_config();
        config
            .configure([("command", "blastp"), ("host", "cluster.example.org")])
            .unwrap();
        config.override_with([("port", "2222")]).unwrap();

        assert_eq!(config.value("port"), Some("2222"));
        assert_eq!(config.value("command"), Some("blastp"));
    }

    #[test]
    fn test_override_rejects_fixed_and_unknown_params() {
        let mut config = ssh_config();

        let err = config.override_with([("protocol", "ssh")]).unwrap_err();
        assert!(matches!(err, ConfigError::OverrideForbidden(name) if name == "protocol"));

        let err = config.override_with([("queue", "all.q")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParam(name) if name == "queue"));
    }

    #[test]
    fn test_choices_are_validated() {
        let mut config = ssh_config();
        let err = config.configure([("protocol", "telnet")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChoice { .. }));
    }

    #[test]
    fn test_secrets_are_masked() {
        let mut config = ssh_config();
        config.configure([("password", "hunter2")]).unwrap();

        assert_eq!(config.value("password"), None);
        assert_eq!(config.secret("password").map(expose), Some("hunter2"));
        assert!(!config.dump().contains("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(config.dump().contains("password: ********"));
    }

    #[test]
    fn test_envelope_params_keep_secrets_encrypted() {
        let cipher = Cipher::random();
        let mut config = ssh_config();
        config
            .configure([("host", "example.org"), ("password", "hunter2")])
            .unwrap();

        let params = config.to_envelope_params(&cipher);
        let stored = params["password"].clone().unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(params["command"], None);

        let mut restored = ssh_config();
        restored.load_envelope_params(&params, &cipher).unwrap();
        assert_eq!(restored.value("host"), Some("example.org"));
        assert_eq!(restored.secret("password").map(expose), Some("hunter2"));
    }
}
