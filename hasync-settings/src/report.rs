use colored::Colorize;
use serde::Serialize;

use crate::catalog::{ServiceCatalog, ServiceDescriptor};
use crate::model::HaSettings;
use crate::reconcile::{FieldChange, Outcome, ReconciliationResult};
use crate::version::OpnsenseVersion;

/// Plain diff lines: `+` set, `-` removed, `~` modified.
pub fn format_changes(changes: &[FieldChange]) -> String {
    let mut out = Vec::new();
    for change in changes {
        let line = match (&change.before, &change.after) {
            (None, Some(after)) => format!("+ {} = {after}", change.path),
            (Some(before), None) => format!("- {} = {before}", change.path),
            (Some(before), Some(after)) => format!("~ {}: {before} -> {after}", change.path),
            (None, None) => continue,
        };
        out.push(line);
    }
    out.join("\n")
}

/// One-line run summary.
pub fn format_summary(result: &ReconciliationResult) -> String {
    format!(
        "changed={} outcome={} changes={}",
        result.changed,
        outcome_label(result.outcome),
        result.diff.len()
    )
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Unchanged => "unchanged",
        Outcome::Planned => "planned",
        Outcome::Committed => "committed",
    }
}

/// Render a reconciliation result for terminal output.
pub fn render_text(result: &ReconciliationResult) -> String {
    let mut out = Vec::new();
    for line in format_changes(&result.diff).lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }
    out.push(format_summary(result).cyan().to_string());
    out.join("\n")
}

/// Render a reconciliation result as JSON.
pub fn render_json(result: &ReconciliationResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

#[derive(Serialize)]
struct Failure<'a> {
    failed: bool,
    msg: &'a str,
}

/// JSON object reported when a run fails.
pub fn render_failure_json(msg: &str) -> serde_json::Result<String> {
    serde_json::to_string(&Failure { failed: true, msg })
}

/// Render stored settings, one `key: value` line each. The password is
/// shown only as set or unset.
pub fn format_settings(settings: &HaSettings, catalog: &ServiceCatalog) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let services: Vec<&str> = settings
        .services_to_synchronize
        .iter()
        .map(|tag| catalog.name_for_tag(tag).unwrap_or(tag.as_str()))
        .collect();

    [
        format!("synchronize_interface: {}", text(&settings.synchronize_interface)),
        format!("synchronize_states: {}", settings.synchronize_states),
        format!("disable_preempt: {}", settings.disable_preempt),
        format!(
            "disconnect_dialup_interfaces: {}",
            settings.disconnect_dialup_interfaces
        ),
        format!("synchronize_peer_ip: {}", text(&settings.synchronize_peer_ip)),
        format!(
            "synchronize_config_to_ip: {}",
            text(&settings.synchronize_config_to_ip)
        ),
        format!(
            "remote_system_username: {}",
            text(&settings.remote_system_username)
        ),
        format!(
            "remote_system_password: {}",
            if settings.remote_system_password.is_some() {
                "(set)"
            } else {
                "(unset)"
            }
        ),
        format!("services_to_synchronize: {}", services.join(", ")),
    ]
    .join("\n")
}

/// Render the services offered by `version`.
pub fn format_services(services: &[&ServiceDescriptor], version: &OpnsenseVersion) -> String {
    let mut out = vec![format!("services for OPNsense {version}")];
    for service in services {
        out.push(format!("- {} ({})", service.name, service.flag_tag()));
    }
    out.join("\n")
}
