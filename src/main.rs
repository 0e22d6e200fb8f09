//! zerotier-hosts - keep hosts files in sync with a ZeroTier network.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use zerotier_hosts::config::{DEFAULT_CONFIG_PATH, write_template};
use zerotier_hosts::util::check_write_access;
use zerotier_hosts::{
    ConfigFile, ConfigOverrides, CycleReport, MembershipClient, SyncConfig, Syncer, paired,
};

#[derive(Parser, Debug)]
#[command(name = "zerotier-hosts", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "ZEROTIER_HOSTS_CONFIG")]
    config: Option<PathBuf>,

    /// ZeroTier Central API token
    #[arg(long, env = "ZEROTIER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Network ID whose members are mirrored
    #[arg(long, env = "ZEROTIER_NETWORK_ID")]
    network_id: Option<String>,

    /// Domain suffix for filter list entries
    #[arg(long, env = "ZEROTIER_DOMAIN")]
    domain: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run one sync cycle (default)
    Sync,
    /// Run sync cycles forever, pausing `interval_secs` between them
    Watch,
    /// Remove every block written by this tool
    Clean,
    /// Write a config template with owner-only permissions
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("zerotier-hosts: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Command::Sync);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if command == Command::Init {
        write_template(&config_path)?;
        println!("{}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = ConfigFile::load(&config_path, cli.config.is_some())?
        .resolve(ConfigOverrides {
            api_key: cli.api_key,
            network_id: cli.network_id,
            domain: cli.domain,
        })
        .with_context(|| format!("loading {}", config_path.display()))?;

    check_write_access(&config.hosts_file)?;

    match command {
        Command::Sync => sync_once(&config, &client(&config)?),
        Command::Watch => watch(&config, &client(&config)?),
        Command::Clean => clean(&config),
        Command::Init => unreachable!("handled above"),
    }
}

fn client(config: &SyncConfig) -> Result<MembershipClient> {
    Ok(MembershipClient::builder(&config.api_key, &config.network_id)
        .base_url(&config.api_url)
        .build()?)
}

/// Resolves the paired host and checks that its hosts file is writable.
fn syncer(config: &SyncConfig) -> Result<Syncer<'_>> {
    let identity = paired::detect(config)?;
    if let Some(host) = &identity.paired {
        check_write_access(&host.hosts_file)?;
    }
    Ok(Syncer::new(config, identity))
}

fn report_exit(report: &CycleReport) -> ExitCode {
    for line in &report.entries {
        println!("{line}");
    }
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn sync_once(config: &SyncConfig, client: &MembershipClient) -> Result<ExitCode> {
    let syncer = syncer(config)?;
    match syncer.run_cycle(client) {
        Ok(report) => Ok(report_exit(&report)),
        Err(e) => {
            error!(error = %e, "Sync cycle skipped");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn watch(config: &SyncConfig, client: &MembershipClient) -> Result<ExitCode> {
    // Fatal checks run once up front; later identity failures only skip a cycle.
    syncer(config)?;
    info!(interval_secs = config.interval.as_secs(), "Watching membership");

    loop {
        match syncer(config).and_then(|s| Ok(s.run_cycle(client)?)) {
            Ok(report) => {
                report_exit(&report);
            }
            Err(e) => warn!(error = %format!("{e:#}"), "Sync cycle skipped"),
        }
        std::thread::sleep(config.interval);
    }
}

fn clean(config: &SyncConfig) -> Result<ExitCode> {
    let syncer = syncer(config)?;
    let outcomes = syncer.clean();
    for outcome in &outcomes {
        if let Ok(true) = outcome.result {
            info!(path = %outcome.path.display(), "Removed managed blocks");
        }
    }
    Ok(if outcomes.iter().all(|o| o.result.is_ok()) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
