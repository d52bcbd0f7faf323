use anyhow::{bail, Result};
use hasync_settings::probe::SystemProbe;
use hasync_settings::reconcile::{ReconciliationResult, Reconciler};
use hasync_settings::report::{render_failure_json, render_json, render_text};
use hasync_settings::request::HaSettingsRequest;

use crate::cli::{ApplyArgs, OutputFormat};
use crate::Environment;

pub fn run_apply(env: &Environment, args: ApplyArgs) -> Result<()> {
    let format = args.format;
    let check = args.check;

    match reconcile(env, args, check) {
        Ok(result) => {
            match format {
                OutputFormat::Text => println!("{}", render_text(&result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
            }
            Ok(())
        }
        Err(err) => {
            if let OutputFormat::Json = format {
                println!("{}", render_failure_json(&format!("{err:#}"))?);
            }
            Err(err)
        }
    }
}

fn reconcile(env: &Environment, args: ApplyArgs, check: bool) -> Result<ReconciliationResult> {
    let request = build_request(args)?;
    let probe = SystemProbe::new(env.version.clone());
    let reconciler = Reconciler::new(&probe, &env.catalog);
    Ok(env.store.reconcile(&reconciler, &request, check)?)
}

/// Combine the parameter file with command line flags; flags win.
fn build_request(args: ApplyArgs) -> Result<HaSettingsRequest> {
    let params = match &args.params {
        Some(path) => Some(HaSettingsRequest::from_json_file(path)?),
        None => None,
    };

    let interface = args
        .synchronize_interface
        .or_else(|| params.as_ref().map(|p| p.synchronize_interface.clone()));
    let Some(interface) = interface else {
        bail!("missing --synchronize-interface (or synchronize_interface in --params)");
    };

    let base = params.unwrap_or_default();
    Ok(HaSettingsRequest {
        synchronize_interface: interface,
        synchronize_config_to_ip: args
            .synchronize_config_to_ip
            .or(base.synchronize_config_to_ip),
        synchronize_peer_ip: args.synchronize_peer_ip.or(base.synchronize_peer_ip),
        disable_preempt: args.disable_preempt.or(base.disable_preempt),
        disconnect_dialup_interfaces: args
            .disconnect_dialup_interfaces
            .or(base.disconnect_dialup_interfaces),
        synchronize_states: args.synchronize_states.or(base.synchronize_states),
        remote_system_username: args.remote_system_username.or(base.remote_system_username),
        remote_system_password: args.remote_system_password.or(base.remote_system_password),
        services_to_synchronize: args
            .services_to_synchronize
            .or(base.services_to_synchronize),
    })
}
