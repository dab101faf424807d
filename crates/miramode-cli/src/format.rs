//! Output formatting utilities for text and JSON output.

use anyhow::Result;
use miramode_core::commands::{TIMER_PAUSED, TIMER_RUNNING};
use miramode_core::{
    DeviceInfo, DeviceSettings, DiscoveredDevice, OutletSettings, PresetDetails, ShowerState,
    TechnicalInformation,
};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Emit JSON instead of text.
    pub json: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, json: bool) -> Self {
        Self { no_color, json }
    }

    /// Serialize value to a pretty JSON string.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)? + "\n")
    }

    /// Bold section title.
    #[must_use]
    pub fn title(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("{}", text.bold())
        }
    }

    /// Dimmed label, padded for alignment.
    #[must_use]
    pub fn label(&self, text: &str) -> String {
        let padded = format!("{:<18}", format!("{}:", text));
        if self.no_color {
            padded
        } else {
            format!("{}", padded.dimmed())
        }
    }
}

/// A paired client as listed by `client-list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEntry {
    pub slot: u8,
    pub name: String,
}

/// Format a temperature in °C.
#[must_use]
pub fn format_temp(celsius: f64) -> String {
    format!("{:.1}°C", celsius)
}

/// Format an on/off flag with color.
#[must_use]
pub fn format_on_off(on: bool, no_color: bool) -> String {
    match (on, no_color) {
        (true, true) => "ON".to_string(),
        (false, true) => "OFF".to_string(),
        (true, false) => format!("{}", "ON".green().bold()),
        (false, false) => format!("{}", "OFF".dimmed()),
    }
}

/// Format seconds as `XmYYs`.
#[must_use]
pub fn format_duration(seconds: u16) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    }
}

/// Describe a timer state byte.
#[must_use]
pub fn format_timer_state(state: u8) -> String {
    match state {
        TIMER_RUNNING => "running".to_string(),
        TIMER_PAUSED => "paused".to_string(),
        0 => "idle".to_string(),
        other => format!("unknown ({})", other),
    }
}

fn format_list(items: &[u8]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outlet indices are zero-based on the wire; humans count from one.
fn format_outlets(indices: &[u8]) -> String {
    let shifted: Vec<u8> = indices.iter().map(|i| i.saturating_add(1)).collect();
    format_list(&shifted)
}

// ============================================================================
// State formatting
// ============================================================================

#[must_use]
pub fn format_state_text(state: &ShowerState, opts: &FormatOptions) -> String {
    let mut out = format!("{}\n", opts.title("Shower State"));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Timer"),
        format_timer_state(state.timer_state)
    ));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Remaining"),
        format_duration(state.remaining_seconds)
    ));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Target"),
        format_temp(state.target_temperature)
    ));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Actual"),
        format_temp(state.actual_temperature)
    ));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Outlet 1"),
        format_on_off(state.outlet1, opts.no_color)
    ));
    out.push_str(&format!(
        "  {}{}\n",
        opts.label("Outlet 2"),
        format_on_off(state.outlet2, opts.no_color)
    ));
    out
}

#[must_use]
pub fn format_settings_text(settings: &DeviceSettings, opts: &FormatOptions) -> String {
    format!(
        "{}\n  {}{}\n  {}{}\n  {}{}\n",
        opts.title("Device Settings"),
        opts.label("Outlets enabled"),
        format_outlets(&settings.outlets_enabled),
        opts.label("Default preset"),
        settings.default_preset_slot,
        opts.label("Controller flags"),
        format_list(&settings.controller_settings),
    )
}

#[must_use]
pub fn format_outlets_text(settings: &OutletSettings, opts: &FormatOptions) -> String {
    format!(
        "{}\n  {}0x{:02X}\n  {}{}\n  {}{}\n  {}{}\n",
        opts.title("Outlet Settings"),
        opts.label("Outlet flag"),
        settings.outlet_flag,
        opts.label("Min duration"),
        format_duration(u16::from(settings.min_duration_seconds)),
        opts.label("Min temperature"),
        format_temp(settings.min_temperature),
        opts.label("Max temperature"),
        format_temp(settings.max_temperature),
    )
}

#[must_use]
pub fn format_technical_text(info: &TechnicalInformation, opts: &FormatOptions) -> String {
    format!(
        "{}\n  {}{} (sw {})\n  {}{} (sw {})\n  {}sw {}\n",
        opts.title("Technical Information"),
        opts.label("Valve"),
        info.valve_type,
        info.valve_sw_version,
        opts.label("User interface"),
        info.ui_type,
        info.ui_sw_version,
        opts.label("Bluetooth"),
        info.bt_sw_version,
    )
}

#[must_use]
pub fn format_presets_text(presets: &[PresetDetails], opts: &FormatOptions) -> String {
    if presets.is_empty() {
        return "No presets stored.\n".to_string();
    }

    let mut out = format!("{}\n", opts.title("Presets"));
    for preset in presets {
        out.push_str(&format!(
            "  [{}] {:<16} {}  {}  outlets: {}\n",
            preset.preset_slot,
            preset.name,
            format_temp(preset.target_temperature),
            format_duration(u16::from(preset.duration_seconds)),
            format_outlets(&preset.outlets_enabled),
        ));
    }
    out
}

#[must_use]
pub fn format_clients_text(clients: &[ClientEntry], opts: &FormatOptions) -> String {
    if clients.is_empty() {
        return "No clients paired.\n".to_string();
    }

    let mut out = format!("{}\n", opts.title("Paired Clients"));
    for client in clients {
        out.push_str(&format!("  [{}] {}\n", client.slot, client.name));
    }
    out
}

// ============================================================================
// Info formatting
// ============================================================================

#[must_use]
pub fn format_info_text(info: &DeviceInfo, opts: &FormatOptions) -> String {
    format!(
        "{}\n  {}{}\n  {}{}\n  {}{}\n",
        opts.title("Device Information"),
        opts.label("Name"),
        info.name,
        opts.label("Model"),
        info.model,
        opts.label("Manufacturer"),
        info.manufacturer,
    )
}

// ============================================================================
// Scan formatting
// ============================================================================

pub fn format_scan_json(devices: &[DiscoveredDevice], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        devices: Vec<DeviceJson<'a>>,
    }

    #[derive(Serialize)]
    struct DeviceJson<'a> {
        name: Option<&'a str>,
        address: &'a str,
        identifier: &'a str,
        rssi: Option<i16>,
        is_mira: bool,
    }

    let result = ScanResult {
        count: devices.len(),
        devices: devices
            .iter()
            .map(|d| DeviceJson {
                name: d.name.as_deref(),
                address: &d.address,
                identifier: &d.identifier,
                rssi: d.rssi,
                is_mira: d.is_mira,
            })
            .collect(),
    };

    opts.as_json(&result)
}

#[must_use]
pub fn format_scan_text(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No devices found.\n".to_string();
    }

    let mut out = format!("{}\n", opts.title(&format!("Found {} device(s)", devices.len())));
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<20} {:<38} {}\n",
            device.name.as_deref().unwrap_or("Unknown"),
            device.identifier,
            rssi
        ));
    }
    out
}

#[must_use]
pub fn format_scan_tips(no_color: bool) -> String {
    let tip_label = if no_color {
        "Tip:".to_string()
    } else {
        format!("{}", "Tip:".yellow().bold())
    };
    format!(
        "\n{} Use 'miramode config set device <identifier>' to set a default device\n     Use 'miramode client-pair -n <name> --save' to pair this host\n",
        tip_label
    )
}
