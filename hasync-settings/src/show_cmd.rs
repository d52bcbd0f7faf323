use anyhow::Result;
use hasync_settings::report::format_settings;

use crate::cli::{OutputFormat, ShowArgs};
use crate::Environment;

pub fn run_show(env: &Environment, args: ShowArgs) -> Result<()> {
    let document = {
        let lock = env.store.lock()?;
        env.store.read(&lock)?
    };
    let settings = document.ha_settings(&env.catalog.managed_tags());

    match args.format {
        OutputFormat::Text => println!("{}", format_settings(&settings, &env.catalog)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&settings)?),
    }
    Ok(())
}
