//! Version-gated catalog of configuration sections that can be synchronized.
//!
//! Membership is a pure function of the service name and the running
//! version: a service outside its version bounds is treated exactly like one
//! that does not exist.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HaError;
use crate::version::OpnsenseVersion;

const EMBEDDED_CATALOG: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/catalog/services.toml"
));

/// One synchronizable service and the releases it exists in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Display name, e.g. `Kea DHCP`.
    pub name: String,
    /// Snake-case identifier accepted as an alias, e.g. `kea_dhcp`.
    pub id: String,
    /// Suffix of the `<hasync>` flag, e.g. `kea` for `synchronizekea`.
    pub tag: String,
    /// First release series carrying the service (inclusive).
    #[serde(default)]
    pub min_version: Option<String>,
    /// Last release series carrying the service (inclusive).
    #[serde(default)]
    pub max_version: Option<String>,
    /// First release series without the service (exclusive).
    #[serde(default)]
    pub removed_in: Option<String>,
}

impl ServiceDescriptor {
    /// Full `<hasync>` child tag for this service.
    pub fn flag_tag(&self) -> String {
        flag_tag(&self.tag)
    }

    /// Whether the service exists in `version`.
    pub fn applies_to(&self, version: &OpnsenseVersion) -> bool {
        let series = version.series();
        let min_ok = self
            .min_version
            .as_deref()
            .and_then(|v| v.parse::<OpnsenseVersion>().ok())
            .map_or(true, |min| series >= min.series());
        let max_ok = self
            .max_version
            .as_deref()
            .and_then(|v| v.parse::<OpnsenseVersion>().ok())
            .map_or(true, |max| series <= max.series());
        let removed = self
            .removed_in
            .as_deref()
            .and_then(|v| v.parse::<OpnsenseVersion>().ok())
            .is_some_and(|removed| series >= removed.series());
        min_ok && max_ok && !removed
    }

    fn matches(&self, requested: &str) -> bool {
        let requested = requested.trim();
        self.name == requested
            || self.name.eq_ignore_ascii_case(requested)
            || self.id.eq_ignore_ascii_case(requested)
    }
}

/// `<hasync>` child tag for a service tag suffix.
pub fn flag_tag(tag: &str) -> String {
    format!("synchronize{tag}")
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    service: Vec<ServiceDescriptor>,
}

/// The full service catalog across all releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Catalog compiled into the binary.
    pub fn embedded() -> Result<Self, HaError> {
        Self::from_toml(EMBEDDED_CATALOG)
    }

    /// Load a catalog file with the same schema as the embedded one.
    pub fn load_file(path: &Path) -> Result<Self, HaError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            HaError::InvalidCatalog(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    /// Load `path` when given, otherwise the embedded catalog.
    pub fn load(path: Option<&Path>) -> Result<Self, HaError> {
        match path {
            Some(path) => Self::load_file(path),
            None => Self::embedded(),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, HaError> {
        let file: CatalogFile =
            toml::from_str(raw).map_err(|err| HaError::InvalidCatalog(err.to_string()))?;
        Self::new(file.service)
    }

    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, HaError> {
        let mut names = BTreeSet::new();
        for service in &services {
            if service.tag.trim().is_empty() {
                return Err(HaError::InvalidCatalog(format!(
                    "service '{}' has an empty tag",
                    service.name
                )));
            }
            if service.tag == "toip" {
                return Err(HaError::InvalidCatalog(format!(
                    "service '{}' collides with the synchronizetoip setting",
                    service.name
                )));
            }
            for bound in [
                &service.min_version,
                &service.max_version,
                &service.removed_in,
            ]
                .into_iter()
                .flatten()
            {
                bound.parse::<OpnsenseVersion>().map_err(|_| {
                    HaError::InvalidCatalog(format!(
                        "service '{}' has invalid version bound '{bound}'",
                        service.name
                    ))
                })?;
            }
            if !names.insert(service.name.to_ascii_lowercase()) {
                return Err(HaError::InvalidCatalog(format!(
                    "duplicate service '{}'",
                    service.name
                )));
            }
        }
        Ok(Self { services })
    }

    /// Every service regardless of version.
    pub fn all(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Services that exist in `version`, in catalog order.
    pub fn available(&self, version: &OpnsenseVersion) -> Vec<&ServiceDescriptor> {
        self.services
            .iter()
            .filter(|service| service.applies_to(version))
            .collect()
    }

    /// Resolve a requested service name against the services of `version`.
    pub fn resolve(
        &self,
        name: &str,
        version: &OpnsenseVersion,
    ) -> Result<&ServiceDescriptor, HaError> {
        let available = self.available(version);
        let exact = available.iter().find(|service| service.name == name.trim());
        exact
            .or_else(|| available.iter().find(|service| service.matches(name)))
            .copied()
            .ok_or_else(|| HaError::UnknownService {
                name: name.to_string(),
                available: available.iter().map(|s| s.name.clone()).collect(),
            })
    }

    /// `<hasync>` flag tags managed by this catalog, across all versions.
    pub fn managed_tags(&self) -> BTreeSet<String> {
        self.services.iter().map(|s| s.tag.clone()).collect()
    }

    /// Display name for a tag suffix, if the catalog knows it.
    pub fn name_for_tag(&self, tag: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.tag == tag)
            .map(|s| s.name.as_str())
    }
}
