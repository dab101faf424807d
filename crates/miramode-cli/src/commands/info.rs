//! Info command implementation.

use anyhow::{Context, Result};

use super::Target;
use crate::format::{FormatOptions, format_info_text};
use crate::util::{disconnect, write_output};

pub async fn cmd_info(target: &Target<'_>, opts: &FormatOptions) -> Result<()> {
    let (_, session) = target.open(None).await?;
    let result = session.device_info().await;
    disconnect(session).await;

    let info = result.context("Failed to read device info")?;

    let content = if opts.json {
        opts.as_json(&info)?
    } else {
        format_info_text(&info, opts)
    };
    write_output(&content)
}
