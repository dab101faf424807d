//! Command implementations for the CLI.

mod client;
mod config;
mod control;
mod info;
mod scan;
mod status;

use std::time::Duration;

use anyhow::Result;
use miramode_core::{ClientIdentity, Device, Session};

use crate::config::Config;
use crate::util::{connect_session, require_device};

pub use client::{cmd_client_list, cmd_client_pair, cmd_client_unpair};
pub use config::cmd_config;
pub use control::{cmd_control, cmd_preset_start};
pub use info::cmd_info;
pub use scan::cmd_scan;
pub use status::{StatusQuery, cmd_status};

/// Where and how to connect for a single command.
pub struct Target<'a> {
    pub device: Option<String>,
    pub timeout: Duration,
    pub config: &'a Config,
    pub quiet: bool,
}

impl Target<'_> {
    /// Resolve the device and open a session with `identity`.
    pub async fn open(&self, identity: Option<ClientIdentity>) -> Result<(String, Session<Device>)> {
        let identifier = require_device(self.device.clone())?;
        let session =
            connect_session(&identifier, self.timeout, identity, self.config, self.quiet).await?;
        Ok((identifier, session))
    }
}
