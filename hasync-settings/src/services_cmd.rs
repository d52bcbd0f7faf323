use anyhow::{Context, Result};
use hasync_settings::report::format_services;

use crate::cli::{OutputFormat, ServicesArgs};
use crate::Environment;

pub fn run_services(env: &Environment, args: ServicesArgs) -> Result<()> {
    if args.all {
        match args.format {
            OutputFormat::Text => {
                for service in env.catalog.all() {
                    let mut bounds = Vec::new();
                    if let Some(min) = &service.min_version {
                        bounds.push(format!(">= {min}"));
                    }
                    if let Some(max) = &service.max_version {
                        bounds.push(format!("<= {max}"));
                    }
                    if let Some(removed) = &service.removed_in {
                        bounds.push(format!("< {removed}"));
                    }
                    let bounds = if bounds.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", bounds.join(", "))
                    };
                    println!("- {} ({}){bounds}", service.name, service.flag_tag());
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(env.catalog.all())?),
        }
        return Ok(());
    }

    let version = env
        .version
        .read()
        .context("failed to determine the installed OPNsense version")?;
    let available = env.catalog.available(&version);

    match args.format {
        OutputFormat::Text => println!("{}", format_services(&available, &version)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&available)?),
    }
    Ok(())
}
