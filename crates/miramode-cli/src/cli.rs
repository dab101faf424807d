//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use miramode_types::MAX_CLIENT_NAME_LEN;
use miramode_types::types::is_valid_client_id;

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device address (MAC address or UUID) or name, or use MIRAMODE_DEVICE env var
    #[arg(short, long, env = "MIRAMODE_DEVICE")]
    pub address: Option<String>,

    /// Scan timeout in seconds
    #[arg(short = 'T', long, default_value = "10")]
    pub timeout: u64,
}

/// Credentials of an already paired client
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// A previously paired client id
    #[arg(short, long, env = "MIRAMODE_CLIENT_ID", value_parser = parse_client_id)]
    pub client_id: Option<u32>,

    /// The client slot corresponding to the client id
    #[arg(short = 's', long, env = "MIRAMODE_CLIENT_SLOT")]
    pub client_slot: Option<u8>,
}

#[derive(Parser)]
#[command(name = "miramode")]
#[command(author, version, about = "CLI for Kohler Mira Mode digital showers", long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true, visible_alias = "debug")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List paired clients
    ClientList {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Pair a new client (put the controller in pairing mode first)
    ClientPair {
        #[command(flatten)]
        device: DeviceArgs,

        /// The new client id, leave empty to generate a random value
        #[arg(short, long, value_parser = parse_client_id)]
        client_id: Option<u32>,

        /// The name to assign to the new client
        #[arg(short = 'n', long, value_parser = parse_client_name)]
        client_name: String,

        /// Save the new identity (and device) to the config file
        #[arg(long)]
        save: bool,
    },

    /// Unpair an existing client
    ClientUnpair {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,

        /// The client slot to unpair
        #[arg(short = 'u', long)]
        client_slot_to_unpair: u8,
    },

    /// Show timer, temperatures and outlet state
    State {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show enabled outlets and the default preset
    Settings {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show outlet duration and temperature limits
    Outlets {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show valve and firmware revisions
    Technical {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show the controller nickname
    Nickname {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// List stored presets
    Presets {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Switch outlets and set the target temperature
    Control {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,

        /// Outlet 1 on or off
        #[arg(long, action = ArgAction::Set, value_parser = parse_bool_arg, default_value = "off")]
        outlet1: bool,

        /// Outlet 2 on or off
        #[arg(long, action = ArgAction::Set, value_parser = parse_bool_arg, default_value = "off")]
        outlet2: bool,

        /// Target temperature in °C
        #[arg(short = 't', long, default_value = "38.0")]
        temperature: f64,
    },

    /// Start a stored preset
    PresetStart {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        client: ClientArgs,

        /// Preset slot to start
        slot: u8,
    },

    /// Show device name, model and manufacturer (no pairing needed)
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Scan for nearby controllers
    Scan {
        /// Scan timeout in seconds
        #[arg(short = 'T', long, default_value = "10")]
        timeout: u64,

        /// List every BLE device, not just Mira Mode controllers
        #[arg(long)]
        all: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default device address
    Device,
    /// Paired client id
    ClientId,
    /// Paired client slot
    ClientSlot,
    /// Default scan timeout in seconds
    Timeout,
    /// Response timeout in milliseconds
    ResponseTimeout,
    /// Temperature mapping (standard, legacy)
    TemperatureMapping,
    /// Number of connection attempts
    ConnectAttempts,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

/// Parse a client id, rejecting 0 and the reserved pairing value
pub fn parse_client_id(s: &str) -> Result<u32, String> {
    let id: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if is_valid_client_id(id) {
        Ok(id)
    } else {
        Err(format!("{} is out of range", id))
    }
}

fn parse_client_name(s: &str) -> Result<String, String> {
    if s.len() > MAX_CLIENT_NAME_LEN {
        Err(format!(
            "client name is {} bytes, at most {} allowed",
            s.len(),
            MAX_CLIENT_NAME_LEN
        ))
    } else {
        Ok(s.to_string())
    }
}

/// Parse boolean argument with flexible input
pub fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: on/off, true/false, yes/no, 1/0",
            s
        )),
    }
}
