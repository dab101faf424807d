//! Core types for the Mira Mode control protocol.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Salt used for the unauthenticated pairing request.
pub const MAGIC_ID: u32 = 0x54D2_EE63;

/// Status byte reported by the device when a command was accepted.
pub const STATUS_SUCCESS: u8 = 0x01;

/// Status byte reported by the device when a command was rejected.
pub const STATUS_FAILURE: u8 = 0x80;

/// Outlet byte value meaning "running".
pub const OUTLET_ON: u8 = 0x64;

/// Outlet byte value meaning "stopped".
pub const OUTLET_OFF: u8 = 0x00;

/// Maximum length in bytes of a client name sent during pairing.
pub const MAX_CLIENT_NAME_LEN: usize = 20;

/// Credentials of a client previously paired with the controller.
///
/// `client_id` is a secret shared with the device and only used to salt
/// request checksums. `client_slot` addresses the client in the device's
/// slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClientIdentity {
    client_id: u32,
    client_slot: u8,
}

impl ClientIdentity {
    /// Create an identity, rejecting ids the device cannot accept.
    ///
    /// # Examples
    ///
    /// ```
    /// use miramode_types::{ClientIdentity, MAGIC_ID};
    ///
    /// assert!(ClientIdentity::new(12345, 1).is_ok());
    /// assert!(ClientIdentity::new(0, 1).is_err());
    /// assert!(ClientIdentity::new(MAGIC_ID, 1).is_err());
    /// ```
    pub fn new(client_id: u32, client_slot: u8) -> Result<Self, ParseError> {
        if !is_valid_client_id(client_id) {
            return Err(ParseError::InvalidClientId(client_id));
        }
        Ok(Self {
            client_id,
            client_slot,
        })
    }

    /// The shared secret used as checksum salt.
    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// The slot this client occupies on the device.
    pub fn client_slot(&self) -> u8 {
        self.client_slot
    }
}

/// Whether `client_id` can be assigned to a client.
pub fn is_valid_client_id(client_id: u32) -> bool {
    client_id != 0 && client_id != MAGIC_ID
}

/// Timer and outlet snapshot, shared by state reports and control echoes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShowerState {
    /// Raw timer state byte.
    pub timer_state: u8,
    /// Requested water temperature in °C.
    pub target_temperature: f64,
    /// Measured water temperature in °C.
    pub actual_temperature: f64,
    /// Whether outlet 1 is running.
    pub outlet1: bool,
    /// Whether outlet 2 is running.
    pub outlet2: bool,
    /// Seconds left on the running timer.
    pub remaining_seconds: u16,
    /// Counter of successfully applied update commands.
    pub update_counter: u8,
}

/// Outlet and controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceSettings {
    /// Indices of enabled outlets.
    pub outlets_enabled: Vec<u8>,
    /// Preset started by default.
    pub default_preset_slot: u8,
    /// Indices of set controller option bits.
    pub controller_settings: Vec<u8>,
}

/// Limits applied to an outlet.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutletSettings {
    /// Raw outlet flag (`0x00`, `0x04` or `0x08`).
    pub outlet_flag: u8,
    /// Minimum run duration in seconds.
    pub min_duration_seconds: u8,
    /// Highest selectable temperature in °C.
    pub max_temperature: f64,
    /// Lowest selectable temperature in °C.
    pub min_temperature: f64,
    /// Counter of successfully applied update commands.
    pub update_counter: u8,
}

/// Hardware and firmware revisions of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TechnicalInformation {
    /// Valve hardware type.
    pub valve_type: u8,
    /// Valve firmware version.
    pub valve_sw_version: u8,
    /// User interface hardware type.
    pub ui_type: u8,
    /// User interface firmware version.
    pub ui_sw_version: u8,
    /// Bluetooth module firmware version.
    pub bt_sw_version: u8,
}

/// A stored shower preset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PresetDetails {
    /// Slot the preset is stored in.
    pub preset_slot: u8,
    /// Preset temperature in °C.
    pub target_temperature: f64,
    /// Preset run time in seconds.
    pub duration_seconds: u8,
    /// Indices of outlets the preset opens.
    pub outlets_enabled: Vec<u8>,
    /// Human-readable preset name.
    pub name: String,
}

/// A decoded device notification.
///
/// The set of variants is closed: every payload shape the controller is
/// known to send maps to exactly one of them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Event {
    /// Outcome of a command. For pairing the status is the assigned slot.
    SuccessOrFailure { status: u8 },
    /// Occupied slot indices (clients or presets, depending on the query).
    Slots { slots: Vec<u8> },
    /// Controller settings.
    DeviceSettings(DeviceSettings),
    /// Current timer/outlet state.
    DeviceState(ShowerState),
    /// Echo of a control command, or a report of controls operated by hand.
    ControlsOperated { change_made: bool, state: ShowerState },
    /// Outlet limits.
    OutletSettings(OutletSettings),
    /// Hardware and firmware revisions.
    TechnicalInformation(TechnicalInformation),
    /// The controller's nickname.
    Nickname { name: String },
    /// Name of the client in the queried slot.
    ClientDetails { name: String },
    /// A stored preset.
    PresetDetails(PresetDetails),
}

impl Event {
    /// Short variant name, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SuccessOrFailure { .. } => "success_or_failure",
            Event::Slots { .. } => "slots",
            Event::DeviceSettings(_) => "device_settings",
            Event::DeviceState(_) => "device_state",
            Event::ControlsOperated { .. } => "controls_operated",
            Event::OutletSettings(_) => "outlet_settings",
            Event::TechnicalInformation(_) => "technical_information",
            Event::Nickname { .. } => "nickname",
            Event::ClientDetails { .. } => "client_details",
            Event::PresetDetails(_) => "preset_details",
        }
    }
}

/// An event together with the client slot its fragment was addressed to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Notification {
    /// Slot decoded from the first fragment's header.
    pub client_slot: u8,
    /// The decoded event.
    pub event: Event,
}

/// Device identification strings from the standard GATT characteristics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    /// Advertised device name.
    pub name: String,
    /// Model number string.
    pub model: String,
    /// Manufacturer name string.
    pub manufacturer: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.model, self.manufacturer)
    }
}

/// Expand the low `width` bits of `bits` into their set indices, ascending.
///
/// # Examples
///
/// ```
/// use miramode_types::types::bit_indices;
///
/// assert_eq!(bit_indices(0b0000_0101, 8), vec![0, 2]);
/// assert_eq!(bit_indices(0x8001, 16), vec![0, 15]);
/// ```
pub fn bit_indices(bits: u16, width: u8) -> Vec<u8> {
    (0..width.min(16)).filter(|i| bits >> i & 1 == 1).collect()
}
