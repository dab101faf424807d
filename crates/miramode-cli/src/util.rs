//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use miramode_core::{
    ClientIdentity, ConnectionConfig, Device, RetryConfig, Session, SessionConfig,
};

use crate::config::Config;

/// Get device identifier, with helpful error message.
pub fn require_device(device: Option<String>) -> Result<String> {
    device.ok_or_else(|| {
        anyhow!(
            "No device specified. Use --address <ADDRESS> or set MIRAMODE_DEVICE environment variable.\n\
             Run 'miramode scan' to find nearby controllers."
        )
    })
}

/// Build the session settings from the config file.
pub fn session_config(config: &Config) -> SessionConfig {
    SessionConfig::new()
        .response_timeout(config.response_timeout())
        .temperature_mapping(config.temperature_mapping.unwrap_or_default())
}

/// Connect to a controller and open a session on it.
///
/// Connection attempts are retried according to the config; a controller
/// that cannot be found at all fails immediately.
pub async fn connect_session(
    identifier: &str,
    timeout: Duration,
    identity: Option<ClientIdentity>,
    config: &Config,
    quiet: bool,
) -> Result<Session<Device>> {
    if !quiet {
        eprintln!("Connecting to {}...", identifier);
    }

    let connection = ConnectionConfig::default().scan_duration(timeout);
    let retry = RetryConfig::for_connect().max_retries(config.connect_attempts().saturating_sub(1));

    let device = Device::connect_with_retry(identifier, connection, &retry)
        .await
        .map_err(|e| {
            anyhow!(
                "Failed to connect to device: {}\n\nCause: {}\n\n\
                 Possible causes:\n  \
                 - Bluetooth may be disabled -- check system settings\n  \
                 - Controller may be out of range -- try moving closer\n  \
                 - Controller may be connected to another host\n  \
                 - Device address may be incorrect -- run 'miramode scan' to verify",
                identifier,
                e
            )
        })?;

    Session::open(device, identity, session_config(config))
        .await
        .context("Failed to open session")
}

/// Tear down a session and its BLE link.
pub async fn disconnect(session: Session<Device>) {
    if let Err(e) = session.transport().disconnect().await {
        tracing::debug!("Disconnect failed: {}", e);
    }
    session.close();
}

/// Write output to stdout
pub fn write_output(content: &str) -> Result<()> {
    print!("{}", content);
    io::stdout().flush()?;
    Ok(())
}
