//! Command-line interface for Kohler Mira Mode digital showers.

mod cli;
mod commands;
mod config;
mod format;
mod util;

use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, DeviceArgs};
use crate::commands::{StatusQuery, Target};
use crate::config::{Config, resolve_device, resolve_identity, resolve_timeout};
use crate::format::FormatOptions;

/// Scan timeout used when neither flag nor config set one.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "miramode", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let opts = FormatOptions::new(cli.no_color, cli.json);
    let config = Config::load();
    let quiet = cli.quiet;

    let target = |device: DeviceArgs| Target {
        device: resolve_device(device.address, &config),
        timeout: Duration::from_secs(resolve_timeout(
            device.timeout,
            &config,
            DEFAULT_TIMEOUT_SECS,
        )),
        config: &config,
        quiet,
    };

    match cli.command {
        Commands::ClientList { device, client } => {
            let identity = resolve_identity(&client, &config)?;
            commands::cmd_client_list(&target(device), identity, &opts).await
        }
        Commands::ClientPair {
            device,
            client_id,
            client_name,
            save,
        } => commands::cmd_client_pair(&target(device), client_id, &client_name, save, &opts).await,
        Commands::ClientUnpair {
            device,
            client,
            client_slot_to_unpair,
        } => {
            let identity = resolve_identity(&client, &config)?;
            commands::cmd_client_unpair(&target(device), identity, client_slot_to_unpair).await
        }
        Commands::State { device, client } => {
            status(target(device), &client, &config, StatusQuery::State, &opts).await
        }
        Commands::Settings { device, client } => {
            status(target(device), &client, &config, StatusQuery::Settings, &opts).await
        }
        Commands::Outlets { device, client } => {
            status(target(device), &client, &config, StatusQuery::Outlets, &opts).await
        }
        Commands::Technical { device, client } => {
            status(target(device), &client, &config, StatusQuery::Technical, &opts).await
        }
        Commands::Nickname { device, client } => {
            status(target(device), &client, &config, StatusQuery::Nickname, &opts).await
        }
        Commands::Presets { device, client } => {
            status(target(device), &client, &config, StatusQuery::Presets, &opts).await
        }
        Commands::Control {
            device,
            client,
            outlet1,
            outlet2,
            temperature,
        } => {
            let identity = resolve_identity(&client, &config)?;
            commands::cmd_control(&target(device), identity, outlet1, outlet2, temperature, &opts)
                .await
        }
        Commands::PresetStart {
            device,
            client,
            slot,
        } => {
            let identity = resolve_identity(&client, &config)?;
            commands::cmd_preset_start(&target(device), identity, slot, &opts).await
        }
        Commands::Info { device } => commands::cmd_info(&target(device), &opts).await,
        Commands::Scan { timeout, all } => {
            let timeout = resolve_timeout(timeout, &config, DEFAULT_TIMEOUT_SECS);
            commands::cmd_scan(timeout, all, quiet, &opts).await
        }
        Commands::Config { action } => commands::cmd_config(action, &opts),
        Commands::Completions { .. } => Ok(()),
    }
}

async fn status(
    target: Target<'_>,
    client: &cli::ClientArgs,
    config: &Config,
    query: StatusQuery,
    opts: &FormatOptions,
) -> Result<()> {
    let identity = resolve_identity(client, config)?;
    commands::cmd_status(&target, identity, query, opts).await
}
