//! Scan command implementation.

use anyhow::{Context, Result};
use miramode_core::scan::{self, ScanOptions};

use crate::format::{FormatOptions, format_scan_json, format_scan_text, format_scan_tips};
use crate::util::write_output;

pub async fn cmd_scan(timeout: u64, all: bool, quiet: bool, opts: &FormatOptions) -> Result<()> {
    if !quiet && !opts.json {
        eprintln!("Scanning for {}s...", timeout);
    }

    let options = ScanOptions::default()
        .duration_secs(timeout)
        .filter_mira_only(!all);

    let devices = scan::scan_with_options(options)
        .await
        .context("Failed to scan for devices")?;

    let content = if opts.json {
        format_scan_json(&devices, opts)?
    } else {
        let mut text = format_scan_text(&devices, opts);
        if !quiet && !devices.is_empty() {
            text.push_str(&format_scan_tips(opts.no_color));
        }
        text
    };

    write_output(&content)
}
