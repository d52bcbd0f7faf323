use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::HaError;

/// Requested high availability settings.
///
/// Every field except `synchronize_interface` may be omitted, which leaves
/// the current value alone. For optional text fields an empty string clears
/// the stored value. `services_to_synchronize: Some(vec![])` disables every
/// service flag, while `None` keeps them as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaSettingsRequest {
    pub synchronize_interface: String,
    #[serde(default)]
    pub synchronize_config_to_ip: Option<String>,
    #[serde(default)]
    pub synchronize_peer_ip: Option<String>,
    #[serde(default)]
    pub disable_preempt: Option<bool>,
    #[serde(default)]
    pub disconnect_dialup_interfaces: Option<bool>,
    #[serde(default)]
    pub synchronize_states: Option<bool>,
    #[serde(default)]
    pub remote_system_username: Option<String>,
    #[serde(default)]
    pub remote_system_password: Option<String>,
    #[serde(default)]
    pub services_to_synchronize: Option<Vec<String>>,
}

impl HaSettingsRequest {
    pub fn new(synchronize_interface: impl Into<String>) -> Self {
        Self {
            synchronize_interface: synchronize_interface.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON parameter object as handed over by a module runner.
    ///
    /// Runner metadata keys (prefixed with `_`) are ignored and `null`
    /// counts as omitted.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let params: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
        let fields: serde_json::Map<String, serde_json::Value> = params
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect();
        serde_json::from_value(serde_json::Value::Object(fields))
    }

    /// Read a JSON parameter file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read parameters {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse parameters {}", path.display()))
    }

    /// Check that supplied addresses are IP addresses. Empty strings clear
    /// the field and are always accepted.
    pub fn validate_addresses(&self) -> Result<(), HaError> {
        for (field, value) in [
            ("synchronize_config_to_ip", &self.synchronize_config_to_ip),
            ("synchronize_peer_ip", &self.synchronize_peer_ip),
        ] {
            let Some(value) = value.as_deref().map(str::trim) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if value.parse::<IpAddr>().is_err() {
                return Err(HaError::InvalidAddress {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HaSettingsRequest;

    #[test]
    fn omitted_null_and_empty_list_are_distinct() {
        let omitted = HaSettingsRequest::from_json(r#"{"synchronize_interface":"LAN"}"#)
            .expect("parse");
        assert_eq!(omitted.services_to_synchronize, None);

        let null = HaSettingsRequest::from_json(
            r#"{"synchronize_interface":"LAN","services_to_synchronize":null,"synchronize_states":null}"#,
        )
        .expect("parse");
        assert_eq!(null, omitted);

        let empty = HaSettingsRequest::from_json(
            r#"{"synchronize_interface":"LAN","services_to_synchronize":[]}"#,
        )
        .expect("parse");
        assert_eq!(empty.services_to_synchronize, Some(Vec::new()));
    }

    #[test]
    fn ignores_runner_metadata_and_rejects_unknown_fields() {
        let request = HaSettingsRequest::from_json(
            r#"{"synchronize_interface":"lan","_ansible_check_mode":true,"disable_preempt":true}"#,
        )
        .expect("parse");
        assert_eq!(request.disable_preempt, Some(true));

        assert!(HaSettingsRequest::from_json(
            r#"{"synchronize_interface":"lan","synchronize_system_username":"root"}"#
        )
        .is_err());
        assert!(HaSettingsRequest::from_json(r#"{"synchronize_states":true}"#).is_err());
    }

    #[test]
    fn validates_addresses() {
        let mut request = HaSettingsRequest::new("lan");
        request.synchronize_peer_ip = Some("224.0.0.240".to_string());
        request.synchronize_config_to_ip = Some(String::new());
        assert!(request.validate_addresses().is_ok());

        request.synchronize_config_to_ip = Some("fw-b.example".to_string());
        let err = request.validate_addresses().expect_err("hostname rejected");
        assert_eq!(
            err.to_string(),
            "'fw-b.example' is not a valid IP address for synchronize_config_to_ip."
        );
    }
}
