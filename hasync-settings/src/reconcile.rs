//! Reconciliation of requested HA settings against a config document.
//!
//! A run moves through validation (interface, addresses, services), diffing
//! and, only when something differs, writing. Validation failures end the run
//! before the document is touched.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{flag_tag, ServiceCatalog};
use crate::document::ConfigDocument;
use crate::error::HaError;
use crate::model::{
    HaSettings, SECTION, TAG_CONFIG_TO_IP, TAG_DISABLE_PREEMPT, TAG_DISCONNECT_PPPS,
    TAG_INTERFACE, TAG_PASSWORD, TAG_PEER_IP, TAG_STATES, TAG_USERNAME,
};
use crate::probe::CapabilityProbe;
use crate::request::HaSettingsRequest;

const MASK: &str = "********";
const FLAG_ON: &str = "on";

/// One differing field between the stored and the requested settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// Document path of the element, e.g. `hasync.pfsyncenabled`.
    pub path: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// How a reconciliation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Stored settings already matched; nothing was written.
    Unchanged,
    /// Changes were found but not written (check mode).
    Planned,
    /// Changes were written to the config file.
    Committed,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub changed: bool,
    pub outcome: Outcome,
    /// Settings as they are stored after the run.
    pub settings: HaSettings,
    pub diff: Vec<FieldChange>,
}

/// Validated target settings and their difference to the stored ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub current: HaSettings,
    pub target: HaSettings,
    pub changes: Vec<FieldChange>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Computes and applies HA settings changes.
pub struct Reconciler<'a, P: CapabilityProbe + ?Sized> {
    probe: &'a P,
    catalog: &'a ServiceCatalog,
}

impl<'a, P: CapabilityProbe + ?Sized> Reconciler<'a, P> {
    pub fn new(probe: &'a P, catalog: &'a ServiceCatalog) -> Self {
        Self { probe, catalog }
    }

    /// Validate `request` and diff it against `document` without modifying it.
    pub fn plan(
        &self,
        request: &HaSettingsRequest,
        document: &ConfigDocument,
    ) -> Result<Plan, HaError> {
        debug!(stage = "validating", "reconciling high availability settings");

        let interface = self
            .probe
            .resolve_interface(document, &request.synchronize_interface)?;
        debug!(requested = %request.synchronize_interface, resolved = %interface, "sync interface resolved");

        request.validate_addresses()?;
        let services = self.resolve_services(request.services_to_synchronize.as_deref())?;

        debug!(stage = "diffing", "computing settings diff");
        let managed = self.catalog.managed_tags();
        let current = document.ha_settings(&managed);
        let target = merge(&current, request, interface, services);
        let changes = diff_settings(&current, &target, &managed);

        Ok(Plan {
            current,
            target,
            changes,
        })
    }

    /// Plan and apply the result to the in-memory `document`.
    ///
    /// The document is only modified when the plan has changes. Whether the
    /// caller persists it decides between [`Outcome::Planned`] and
    /// [`Outcome::Committed`]; this returns `Planned` for any change.
    pub fn reconcile(
        &self,
        request: &HaSettingsRequest,
        document: &mut ConfigDocument,
    ) -> Result<ReconciliationResult, HaError> {
        let plan = self.plan(request, document)?;

        if plan.is_noop() {
            info!("high availability settings already up to date");
            return Ok(ReconciliationResult {
                changed: false,
                outcome: Outcome::Unchanged,
                settings: plan.current,
                diff: Vec::new(),
            });
        }

        info!(changes = plan.changes.len(), "high availability settings differ");
        document.set_ha_settings(&plan.target, &self.catalog.managed_tags());
        Ok(ReconciliationResult {
            changed: true,
            outcome: Outcome::Planned,
            settings: plan.target,
            diff: plan.changes,
        })
    }

    /// Resolve every requested service or fail on the first unknown one.
    ///
    /// The version is only probed when there is something to resolve.
    fn resolve_services(
        &self,
        requested: Option<&[String]>,
    ) -> Result<Option<BTreeSet<String>>, HaError> {
        let Some(requested) = requested else {
            return Ok(None);
        };
        if requested.is_empty() {
            return Ok(Some(BTreeSet::new()));
        }

        let version = self.probe.current_version()?;
        let mut tags = BTreeSet::new();
        for name in requested {
            let service = self.catalog.resolve(name, &version)?;
            tags.insert(service.tag.clone());
        }
        debug!(%version, services = ?tags, "services resolved");
        Ok(Some(tags))
    }
}

/// Overlay the supplied request fields on the current settings.
fn merge(
    current: &HaSettings,
    request: &HaSettingsRequest,
    interface: String,
    services: Option<BTreeSet<String>>,
) -> HaSettings {
    HaSettings {
        synchronize_interface: Some(interface),
        synchronize_config_to_ip: overlay_text(
            &current.synchronize_config_to_ip,
            &request.synchronize_config_to_ip,
        ),
        synchronize_peer_ip: overlay_text(&current.synchronize_peer_ip, &request.synchronize_peer_ip),
        disable_preempt: request.disable_preempt.unwrap_or(current.disable_preempt),
        disconnect_dialup_interfaces: request
            .disconnect_dialup_interfaces
            .unwrap_or(current.disconnect_dialup_interfaces),
        synchronize_states: request
            .synchronize_states
            .unwrap_or(current.synchronize_states),
        remote_system_username: overlay_exact(
            &current.remote_system_username,
            &request.remote_system_username,
        ),
        remote_system_password: overlay_exact(
            &current.remote_system_password,
            &request.remote_system_password,
        ),
        services_to_synchronize: services
            .unwrap_or_else(|| current.services_to_synchronize.clone()),
    }
}

/// Omitted keeps `current`, an empty string clears, anything else replaces.
fn overlay_text(current: &Option<String>, requested: &Option<String>) -> Option<String> {
    match requested.as_deref().map(str::trim) {
        None => current.clone(),
        Some("") => None,
        Some(value) => Some(value.to_string()),
    }
}

/// Like [`overlay_text`] without trimming; only `""` clears.
fn overlay_exact(current: &Option<String>, requested: &Option<String>) -> Option<String> {
    match requested.as_deref() {
        None => current.clone(),
        Some("") => None,
        Some(value) => Some(value.to_string()),
    }
}

/// Field-by-field difference, one entry per scalar and per service flag.
pub fn diff_settings(
    current: &HaSettings,
    target: &HaSettings,
    managed_tags: &BTreeSet<String>,
) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    let mut text = |tag: &str, before: &Option<String>, after: &Option<String>, secret: bool| {
        if before != after {
            let shown = |value: &Option<String>| {
                value
                    .as_ref()
                    .map(|v| if secret { MASK.to_string() } else { v.clone() })
            };
            changes.push(FieldChange {
                path: format!("{SECTION}.{tag}"),
                before: shown(before),
                after: shown(after),
            });
        }
    };

    text(
        TAG_INTERFACE,
        &current.synchronize_interface,
        &target.synchronize_interface,
        false,
    );
    text(
        TAG_STATES,
        &flag(current.synchronize_states),
        &flag(target.synchronize_states),
        false,
    );
    text(
        TAG_DISABLE_PREEMPT,
        &flag(current.disable_preempt),
        &flag(target.disable_preempt),
        false,
    );
    text(
        TAG_DISCONNECT_PPPS,
        &flag(current.disconnect_dialup_interfaces),
        &flag(target.disconnect_dialup_interfaces),
        false,
    );
    text(
        TAG_PEER_IP,
        &current.synchronize_peer_ip,
        &target.synchronize_peer_ip,
        false,
    );
    text(
        TAG_CONFIG_TO_IP,
        &current.synchronize_config_to_ip,
        &target.synchronize_config_to_ip,
        false,
    );
    text(
        TAG_USERNAME,
        &current.remote_system_username,
        &target.remote_system_username,
        false,
    );
    text(
        TAG_PASSWORD,
        &current.remote_system_password,
        &target.remote_system_password,
        true,
    );

    for tag in managed_tags {
        text(
            flag_tag(tag).as_str(),
            &flag(current.services_to_synchronize.contains(tag)),
            &flag(target.services_to_synchronize.contains(tag)),
            false,
        );
    }

    changes
}

fn flag(enabled: bool) -> Option<String> {
    enabled.then(|| FLAG_ON.to_string())
}
