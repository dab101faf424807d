//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use miramode_core::{ClientIdentity, TemperatureMapping};
use serde::{Deserialize, Serialize};

use crate::cli::{ClientArgs, ConfigKey};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MIRAMODE_CONFIG";

/// Default number of connection attempts
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Default response timeout in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default device address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Paired client id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u32>,

    /// Slot of the paired client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_slot: Option<u8>,

    /// Scan timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Response timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<u64>,

    /// Temperature byte mapping spoken by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_mapping: Option<TemperatureMapping>,

    /// Number of connection attempts before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("miramode")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults with a warning
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Current value of `key`, formatted for display
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Device => self.device.clone(),
            ConfigKey::ClientId => self.client_id.map(|v| v.to_string()),
            ConfigKey::ClientSlot => self.client_slot.map(|v| v.to_string()),
            ConfigKey::Timeout => self.timeout.map(|v| v.to_string()),
            ConfigKey::ResponseTimeout => self.response_timeout.map(|v| v.to_string()),
            ConfigKey::TemperatureMapping => self.temperature_mapping.map(|v| v.to_string()),
            ConfigKey::ConnectAttempts => self.connect_attempts.map(|v| v.to_string()),
        }
    }

    /// Parse and store `value` under `key`
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::Device => self.device = Some(value.to_string()),
            ConfigKey::ClientId => {
                let id = crate::cli::parse_client_id(value).map_err(|e| anyhow!(e))?;
                self.client_id = Some(id);
            }
            ConfigKey::ClientSlot => self.client_slot = Some(parse_number(key, value)?),
            ConfigKey::Timeout => self.timeout = Some(parse_number(key, value)?),
            ConfigKey::ResponseTimeout => {
                let ms: u64 = parse_number(key, value)?;
                if ms == 0 {
                    bail!("response-timeout must be greater than zero");
                }
                self.response_timeout = Some(ms);
            }
            ConfigKey::TemperatureMapping => {
                let mapping = value
                    .parse::<TemperatureMapping>()
                    .map_err(|e| anyhow!("{}", e))?;
                self.temperature_mapping = Some(mapping);
            }
            ConfigKey::ConnectAttempts => {
                let attempts: u32 = parse_number(key, value)?;
                if attempts == 0 {
                    bail!("connect-attempts must be at least 1");
                }
                self.connect_attempts = Some(attempts);
            }
        }
        Ok(())
    }

    /// Remove `key`
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Device => self.device = None,
            ConfigKey::ClientId => self.client_id = None,
            ConfigKey::ClientSlot => self.client_slot = None,
            ConfigKey::Timeout => self.timeout = None,
            ConfigKey::ResponseTimeout => self.response_timeout = None,
            ConfigKey::TemperatureMapping => self.temperature_mapping = None,
            ConfigKey::ConnectAttempts => self.connect_attempts = None,
        }
    }

    /// Response timeout, falling back to the default
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(
            self.response_timeout
                .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_MS),
        )
    }

    /// Connection attempts, falling back to the default
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
            .unwrap_or(DEFAULT_CONNECT_ATTEMPTS)
            .max(1)
    }
}

fn parse_number<T: std::str::FromStr>(key: ConfigKey, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("'{}' is not a valid value for {:?}", value, key))
}

/// Resolve device from arg, env var, or config.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device.or_else(|| config.device.clone())
}

/// Resolve the client identity from args (or their env vars), then config.
pub fn resolve_identity(args: &ClientArgs, config: &Config) -> Result<ClientIdentity> {
    let client_id = args.client_id.or(config.client_id);
    let client_slot = args.client_slot.or(config.client_slot);

    match (client_id, client_slot) {
        (Some(id), Some(slot)) => {
            ClientIdentity::new(id, slot).with_context(|| format!("Invalid client id {}", id))
        }
        _ => bail!(
            "No paired client specified. Use --client-id and --client-slot, set \
             MIRAMODE_CLIENT_ID and MIRAMODE_CLIENT_SLOT, or pair with \
             'miramode client-pair --save'."
        ),
    }
}

/// Resolve timeout: use provided value, fall back to config, then default
pub fn resolve_timeout(cmd_timeout: u64, config: &Config, default: u64) -> u64 {
    if cmd_timeout != default {
        cmd_timeout
    } else {
        config.timeout.unwrap_or(default)
    }
}
