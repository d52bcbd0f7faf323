//! Read-only facts about the running firewall: assigned interfaces and the
//! installed product version.

use std::collections::BTreeSet;

use opnsense_xml::XmlNode;
use serde::Serialize;

use crate::document::ConfigDocument;
use crate::error::HaError;
use crate::version::{OpnsenseVersion, VersionSource};

/// One assigned interface and the properties relevant to pfsync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    /// Assignment identifier, e.g. `lan` or `opt1`.
    pub identifier: String,
    pub description: Option<String>,
    /// Backing device, e.g. `igb1` or `wg0`.
    pub device: Option<String>,
    pub enabled: bool,
    pub is_virtual: bool,
}

impl InterfaceInfo {
    /// Whether the interface can carry pfsync traffic.
    pub fn eligible(&self) -> bool {
        self.enabled && !self.is_virtual
    }

    fn answers_to(&self, requested: &str) -> bool {
        self.identifier.eq_ignore_ascii_case(requested)
    }

    fn described_as(&self, requested: &str) -> bool {
        self.description
            .as_deref()
            .is_some_and(|descr| descr.eq_ignore_ascii_case(requested))
    }
}

/// Queries against the live system.
pub trait CapabilityProbe {
    /// All assigned interfaces, eligible or not.
    fn interfaces(&self, document: &ConfigDocument) -> Result<Vec<InterfaceInfo>, HaError>;

    /// Installed product version.
    fn current_version(&self) -> Result<OpnsenseVersion, HaError>;

    /// Identifiers of interfaces that are enabled and not virtual.
    fn enabled_physical_interfaces(
        &self,
        document: &ConfigDocument,
    ) -> Result<BTreeSet<String>, HaError> {
        Ok(self
            .interfaces(document)?
            .into_iter()
            .filter(InterfaceInfo::eligible)
            .map(|iface| iface.identifier)
            .collect())
    }

    /// Map a requested interface name to the identifier stored in the config.
    ///
    /// The identifier is matched first, then the description, both ignoring
    /// case. Only eligible interfaces are considered.
    fn resolve_interface(
        &self,
        document: &ConfigDocument,
        requested: &str,
    ) -> Result<String, HaError> {
        let requested_trimmed = requested.trim();
        let eligible: Vec<InterfaceInfo> = self
            .interfaces(document)?
            .into_iter()
            .filter(InterfaceInfo::eligible)
            .collect();

        eligible
            .iter()
            .find(|iface| iface.answers_to(requested_trimmed))
            .or_else(|| {
                eligible
                    .iter()
                    .find(|iface| iface.described_as(requested_trimmed))
            })
            .map(|iface| iface.identifier.to_ascii_lowercase())
            .ok_or_else(|| HaError::InterfaceNotFound {
                name: requested.to_string(),
            })
    }
}

/// Probe backed by the interface assignments of the config being edited and
/// the firmware version source.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    version: VersionSource,
}

impl SystemProbe {
    pub fn new(version: VersionSource) -> Self {
        Self { version }
    }
}

impl CapabilityProbe for SystemProbe {
    fn interfaces(&self, document: &ConfigDocument) -> Result<Vec<InterfaceInfo>, HaError> {
        Ok(collect_interfaces(document.root()))
    }

    fn current_version(&self) -> Result<OpnsenseVersion, HaError> {
        self.version.read()
    }
}

/// Probe answering from fixed facts.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    pub interfaces: Vec<InterfaceInfo>,
    pub version: OpnsenseVersion,
}

impl CapabilityProbe for StaticProbe {
    fn interfaces(&self, _document: &ConfigDocument) -> Result<Vec<InterfaceInfo>, HaError> {
        Ok(self.interfaces.clone())
    }

    fn current_version(&self) -> Result<OpnsenseVersion, HaError> {
        Ok(self.version.clone())
    }
}

/// Read interface assignments from the `<interfaces>` section.
pub fn collect_interfaces(root: &XmlNode) -> Vec<InterfaceInfo> {
    let Some(interfaces) = root.get_child("interfaces") else {
        return Vec::new();
    };

    interfaces
        .children
        .iter()
        .map(|iface| {
            let device = iface.get_text(&["if"]).map(|s| s.trim().to_string());
            let is_virtual = truthy(iface, "virtual")
                || iface.get_text(&["type"]).map(str::trim) == Some("group")
                || device.as_deref().is_some_and(is_virtual_device);
            InterfaceInfo {
                identifier: iface.tag.clone(),
                description: iface
                    .get_text(&["descr"])
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                device,
                enabled: truthy(iface, "enable"),
                is_virtual,
            }
        })
        .collect()
}

/// `<tag>` exists and does not hold `0`. An empty element counts as set.
fn truthy(node: &XmlNode, tag: &str) -> bool {
    node.get_child(tag)
        .is_some_and(|child| child.text.as_deref().map(str::trim) != Some("0"))
}

/// Tunnel and loopback devices that cannot carry pfsync traffic.
fn is_virtual_device(device: &str) -> bool {
    let lower = device.trim().to_ascii_lowercase();
    [
        "ovpns", "ovpnc", "openvpn", "wg", "tun", "tap", "gif", "gre", "enc", "ipsec", "lo",
    ]
    .iter()
    .any(|prefix| lower.starts_with(prefix))
}
