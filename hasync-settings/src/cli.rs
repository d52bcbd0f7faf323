use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "hasync-settings")]
#[command(about = "Reconcile OPNsense high availability settings in config.xml")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Bring the high availability settings in line with the given values.
    Apply(ApplyArgs),
    /// Show the high availability settings stored in the config.
    Show(ShowArgs),
    /// List services that can be synchronized on this firewall version.
    Services(ServicesArgs),
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Tool settings file. Defaults to /usr/local/etc/hasync-settings.toml if present.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
    /// OPNsense config file to operate on.
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,
    /// JSON file holding the installed product version.
    #[arg(long, global = true, conflicts_with = "opnsense_version")]
    pub version_file: Option<PathBuf>,
    /// Use this version instead of reading it from the system (for example 23.7, 24.1.4).
    #[arg(long, global = true)]
    pub opnsense_version: Option<String>,
    /// Service catalog TOML replacing the built-in one.
    #[arg(long, global = true)]
    pub catalog_file: Option<PathBuf>,
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Interface carrying pfsync traffic, by identifier (opt1) or description (SYNC).
    #[arg(long)]
    pub synchronize_interface: Option<String>,
    /// Peer that receives configuration changes. Empty clears it.
    #[arg(long)]
    pub synchronize_config_to_ip: Option<String>,
    /// Peer for state synchronization. Empty clears it.
    #[arg(long)]
    pub synchronize_peer_ip: Option<String>,
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub disable_preempt: Option<bool>,
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub disconnect_dialup_interfaces: Option<bool>,
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub synchronize_states: Option<bool>,
    #[arg(long)]
    pub remote_system_username: Option<String>,
    #[arg(long)]
    pub remote_system_password: Option<String>,
    /// Services to synchronize. Given without names, disables all of them.
    #[arg(long, value_name = "NAME", num_args = 0..)]
    pub services_to_synchronize: Option<Vec<String>>,
    /// JSON parameter file; flags given on the command line take precedence.
    #[arg(long)]
    pub params: Option<PathBuf>,
    /// Report what would change without writing the config.
    #[arg(long)]
    pub check: bool,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ServicesArgs {
    /// List every catalog entry regardless of version.
    #[arg(long)]
    pub all: bool,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
