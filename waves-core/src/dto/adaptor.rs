//! Serialized adaptor reference

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of an adaptor plus its resolved parameters
///
/// Serialized as `{"clazz": "<registry key>", "params": {...}}`. Encrypted
/// parameters are stored in their encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorEnvelope {
    pub clazz: String,
    #[serde(default)]
    pub params: BTreeMap<String, Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let mut params = BTreeMap::new();
        params.insert("command".to_string(), Some("echo".to_string()));
        params.insert("host".to_string(), None);
        let envelope = AdaptorEnvelope {
            clazz: "local-shell".to_string(),
            params,
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["clazz"], "local-shell");
        assert_eq!(value["params"]["command"], "echo");
        assert!(value["params"]["host"].is_null());
    }
}
