use anyhow::{Context, Result};
use clap::Parser;
use hasync_settings::catalog::ServiceCatalog;
use hasync_settings::settings::ToolSettings;
use hasync_settings::store::ConfigStore;
use hasync_settings::version::VersionSource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod apply_cmd;
mod cli;
mod services_cmd;
mod show_cmd;

use cli::{Cli, Command, GlobalArgs};

const LOG_ENV: &str = "HASYNC_LOG";

/// Resolved locations and catalog shared by every subcommand.
pub struct Environment {
    store: ConfigStore,
    catalog: ServiceCatalog,
    version: VersionSource,
}

impl Environment {
    fn from_args(global: &GlobalArgs) -> Result<Self> {
        let mut settings = ToolSettings::load(global.settings.as_deref())?;
        if let Some(path) = &global.config_file {
            settings.config_path = path.clone();
        }
        if let Some(path) = &global.version_file {
            settings.version_file = path.clone();
        }
        if let Some(path) = &global.catalog_file {
            settings.catalog_file = Some(path.clone());
        }

        let catalog = ServiceCatalog::load(settings.catalog_file.as_deref())
            .context("failed to load service catalog")?;
        let version = match &global.opnsense_version {
            Some(version) => VersionSource::Fixed(version.clone()),
            None => VersionSource::File(settings.version_file.clone()),
        };

        Ok(Self {
            store: settings.store(),
            catalog,
            version,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let env = Environment::from_args(&cli.global)?;
    match cli.command {
        Command::Apply(args) => apply_cmd::run_apply(&env, args),
        Command::Show(args) => show_cmd::run_show(&env, args),
        Command::Services(args) => services_cmd::run_services(&env, args),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
