//! Typed view of the `<hasync>` section.
//!
//! Boolean settings use the firewall's on/absent encoding: a child element
//! holding `on` means enabled, a missing element means disabled. Per-service
//! flags follow the same rule with tags named `synchronize<tag>`.

use std::collections::BTreeSet;

use opnsense_xml::XmlNode;
use serde::Serialize;

use crate::catalog::flag_tag;

pub const SECTION: &str = "hasync";
pub const TAG_INTERFACE: &str = "pfsyncinterface";
pub const TAG_CONFIG_TO_IP: &str = "synchronizetoip";
pub const TAG_PEER_IP: &str = "pfsyncpeerip";
pub const TAG_USERNAME: &str = "username";
pub const TAG_PASSWORD: &str = "password";
pub const TAG_STATES: &str = "pfsyncenabled";
pub const TAG_DISABLE_PREEMPT: &str = "disablepreempt";
pub const TAG_DISCONNECT_PPPS: &str = "disconnectppps";

const FLAG_ON: &str = "on";

/// High availability settings as stored in the config document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HaSettings {
    pub synchronize_interface: Option<String>,
    pub synchronize_config_to_ip: Option<String>,
    pub synchronize_peer_ip: Option<String>,
    pub disable_preempt: bool,
    pub disconnect_dialup_interfaces: bool,
    pub synchronize_states: bool,
    pub remote_system_username: Option<String>,
    #[serde(skip_serializing)]
    pub remote_system_password: Option<String>,
    /// Tag suffixes of enabled service flags, e.g. `nat`, `kea`.
    pub services_to_synchronize: BTreeSet<String>,
}

impl HaSettings {
    /// Read settings from a `<hasync>` node.
    ///
    /// Only service flags whose tag is in `managed_tags` are collected; other
    /// `synchronize*` children are left to the caller untouched.
    pub fn from_node(node: &XmlNode, managed_tags: &BTreeSet<String>) -> Self {
        let services = managed_tags
            .iter()
            .filter(|tag| flag_enabled(node, &flag_tag(tag)))
            .cloned()
            .collect();

        Self {
            synchronize_interface: text_value(node, TAG_INTERFACE),
            synchronize_config_to_ip: text_value(node, TAG_CONFIG_TO_IP),
            synchronize_peer_ip: text_value(node, TAG_PEER_IP),
            disable_preempt: flag_enabled(node, TAG_DISABLE_PREEMPT),
            disconnect_dialup_interfaces: flag_enabled(node, TAG_DISCONNECT_PPPS),
            synchronize_states: flag_enabled(node, TAG_STATES),
            remote_system_username: exact_text_value(node, TAG_USERNAME),
            remote_system_password: exact_text_value(node, TAG_PASSWORD),
            services_to_synchronize: services,
        }
    }

    /// Write these settings into an existing `<hasync>` node.
    ///
    /// Children are edited in place so element order and unmanaged children
    /// survive. Cleared remote sync fields stay as empty elements, a cleared
    /// peer address is removed.
    pub fn apply_to_node(&self, node: &mut XmlNode, managed_tags: &BTreeSet<String>) {
        if let Some(interface) = &self.synchronize_interface {
            node.set_child_text(TAG_INTERFACE, interface);
        }

        match &self.synchronize_peer_ip {
            Some(ip) => node.set_child_text(TAG_PEER_IP, ip),
            None => {
                node.remove_children(TAG_PEER_IP);
            }
        }

        set_flag(node, TAG_STATES, self.synchronize_states);
        set_flag(node, TAG_DISABLE_PREEMPT, self.disable_preempt);
        set_flag(node, TAG_DISCONNECT_PPPS, self.disconnect_dialup_interfaces);

        for (tag, value) in [
            (TAG_CONFIG_TO_IP, &self.synchronize_config_to_ip),
            (TAG_USERNAME, &self.remote_system_username),
            (TAG_PASSWORD, &self.remote_system_password),
        ] {
            match value {
                Some(value) => node.set_child_text(tag, value),
                None => {
                    node.clear_child_text(tag);
                }
            }
        }

        for tag in managed_tags {
            let enabled = self.services_to_synchronize.contains(tag);
            set_flag(node, &flag_tag(tag), enabled);
        }
    }

    /// Build a fresh `<hasync>` node holding these settings.
    pub fn to_node(&self, managed_tags: &BTreeSet<String>) -> XmlNode {
        let mut node = XmlNode::new(SECTION);
        if self.synchronize_states {
            node.set_child_text(TAG_STATES, FLAG_ON);
        }
        if let Some(interface) = &self.synchronize_interface {
            node.set_child_text(TAG_INTERFACE, interface);
        }
        for tag in [TAG_CONFIG_TO_IP, TAG_USERNAME, TAG_PASSWORD] {
            node.children.push(XmlNode::new(tag));
        }
        self.apply_to_node(&mut node, managed_tags);
        node
    }
}

/// Non-empty, trimmed text of the first child named `tag`.
fn text_value(node: &XmlNode, tag: &str) -> Option<String> {
    node.get_text(&[tag])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Non-empty text of the first child named `tag`, exactly as stored.
fn exact_text_value(node: &XmlNode, tag: &str) -> Option<String> {
    node.get_text(&[tag])
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// On/absent flag decoding: present with a value means enabled.
fn flag_enabled(node: &XmlNode, tag: &str) -> bool {
    node.get_children(tag).iter().any(|child| {
        child
            .text
            .as_deref()
            .map(str::trim)
            .is_some_and(|value| !value.is_empty() && value != "0")
    })
}

fn set_flag(node: &mut XmlNode, tag: &str, enabled: bool) {
    if enabled {
        if !flag_enabled(node, tag) || node.get_text(&[tag]).map(str::trim) != Some(FLAG_ON) {
            node.remove_children(tag);
            node.children.push(XmlNode::with_text(tag, FLAG_ON));
        }
    } else {
        node.remove_children(tag);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use opnsense_xml::parse;
    use pretty_assertions::assert_eq;

    use super::HaSettings;

    fn managed() -> BTreeSet<String> {
        ["nat", "rules", "kea"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn decodes_on_absent_flags_and_text_fields() {
        let node = parse(
            br#"<hasync>
                <pfsyncenabled>on</pfsyncenabled>
                <pfsyncinterface>opt1</pfsyncinterface>
                <synchronizetoip/>
                <username>root</username>
                <synchronizenat>on</synchronizenat>
                <synchronizeplugin>on</synchronizeplugin>
            </hasync>"#,
        )
        .expect("parse");

        let settings = HaSettings::from_node(&node, &managed());
        assert!(settings.synchronize_states);
        assert!(!settings.disable_preempt);
        assert_eq!(settings.synchronize_interface.as_deref(), Some("opt1"));
        assert_eq!(settings.synchronize_config_to_ip, None);
        assert_eq!(settings.remote_system_username.as_deref(), Some("root"));
        assert_eq!(
            settings.services_to_synchronize,
            ["nat".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn credentials_are_read_exactly_as_stored() {
        let node = parse(
            b"<hasync><pfsyncinterface> opt1 </pfsyncinterface><username> admin</username><password>new pass </password></hasync>",
        )
        .expect("parse");

        let settings = HaSettings::from_node(&node, &managed());
        assert_eq!(settings.synchronize_interface.as_deref(), Some("opt1"));
        assert_eq!(settings.remote_system_username.as_deref(), Some(" admin"));
        assert_eq!(settings.remote_system_password.as_deref(), Some("new pass "));
    }

    #[test]
    fn apply_edits_in_place_and_keeps_unmanaged_children() {
        let mut node = parse(
            br#"<hasync><pfsyncinterface>lan</pfsyncinterface><synchronizetoip/><username/><password/><synchronizeplugin>on</synchronizeplugin><synchronizerules>on</synchronizerules></hasync>"#,
        )
        .expect("parse");

        let settings = HaSettings {
            synchronize_interface: Some("opt1".to_string()),
            synchronize_states: true,
            synchronize_config_to_ip: Some("10.0.0.2".to_string()),
            services_to_synchronize: ["nat".to_string()].into_iter().collect(),
            ..HaSettings::default()
        };
        settings.apply_to_node(&mut node, &managed());

        assert_eq!(
            node.to_string(),
            "<hasync><pfsyncinterface>opt1</pfsyncinterface><synchronizetoip>10.0.0.2</synchronizetoip><username/><password/><synchronizeplugin>on</synchronizeplugin><pfsyncenabled>on</pfsyncenabled><synchronizenat>on</synchronizenat></hasync>"
        );
        assert_eq!(HaSettings::from_node(&node, &managed()), settings);
    }

    #[test]
    fn disabling_removes_flag_elements() {
        let mut node = parse(
            br#"<hasync><pfsyncenabled>on</pfsyncenabled><disablepreempt>on</disablepreempt><disconnectppps>on</disconnectppps><pfsyncpeerip>10.0.0.9</pfsyncpeerip></hasync>"#,
        )
        .expect("parse");

        HaSettings::default().apply_to_node(&mut node, &managed());
        assert_eq!(node.to_string(), "<hasync/>");
    }

    #[test]
    fn fresh_node_has_firewall_layout() {
        let settings = HaSettings {
            synchronize_interface: Some("lan".to_string()),
            ..HaSettings::default()
        };
        assert_eq!(
            settings.to_node(&managed()).to_string(),
            "<hasync><pfsyncinterface>lan</pfsyncinterface><synchronizetoip/><username/><password/></hasync>"
        );
    }
}
