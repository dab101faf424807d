//! Request catalog for the Mira Mode control protocol.
//!
//! Each request is `[destination_slot, opcode, length/flags, args...]`
//! followed by the salted checksum. The constants below are the opcode and
//! selector bytes; [`Command`] is the closed set of requests a client can
//! issue.

/// Client table request.
/// Format: `[slot, CLIENT_TABLE, 0x01, selector]`
pub const CLIENT_TABLE: u8 = 0x6b;

/// Selector for the client slot bitmap.
pub const CLIENT_SLOTS_SELECTOR: u8 = 0x00;

/// Base selector for client details; the queried slot is added to it.
pub const CLIENT_DETAILS_BASE: u8 = 0x10;

/// Device settings request.
/// Format: `[slot, DEVICE_SETTINGS, 0x00]`
pub const DEVICE_SETTINGS: u8 = 0x3e;

/// Device state request.
/// Format: `[slot, DEVICE_STATE, 0x00]`
pub const DEVICE_STATE: u8 = 0x07;

/// Nickname request.
/// Format: `[slot, NICKNAME, 0x00]`
pub const NICKNAME: u8 = 0x44;

/// Outlet settings request.
/// Format: `[slot, OUTLET_SETTINGS, 0x00]`
pub const OUTLET_SETTINGS: u8 = 0x10;

/// Preset table request.
/// Format: `[slot, PRESET_TABLE, 0x01, selector]`
pub const PRESET_TABLE: u8 = 0x30;

/// Base selector for preset details; the queried preset slot is added to it.
pub const PRESET_DETAILS_BASE: u8 = 0x40;

/// Selector for the preset slot bitmap.
pub const PRESET_SLOTS_SELECTOR: u8 = 0x80;

/// Technical information request.
/// Format: `[slot, TECHNICAL_INFO, 0x01, 0x01]`
pub const TECHNICAL_INFO: u8 = 0x32;

/// Pair and unpair share one opcode and differ by length byte.
/// Pair: `[0x00, CLIENT_PAIRING, 0x18, id(4), name(20)]`
/// Unpair: `[slot, CLIENT_PAIRING, 0x01, target_slot]`
pub const CLIENT_PAIRING: u8 = 0xeb;

/// Length byte of a pairing request (4 id bytes + 20 name bytes).
pub const PAIR_LENGTH: u8 = 24;

/// Outlet control request.
/// Format: `[slot, CONTROL_OUTLETS, 0x05, timer_mode, 0x01, temp, outlet1, outlet2]`
pub const CONTROL_OUTLETS: u8 = 0x87;

/// Timer mode sent when at least one outlet is switched on.
pub const TIMER_RUNNING: u8 = 0x01;

/// Timer mode sent when every outlet is switched off.
pub const TIMER_PAUSED: u8 = 0x03;

/// Start preset request.
/// Format: `[slot, START_PRESET, 0x01, preset_slot]`
pub const START_PRESET: u8 = 0xb1;

/// A request to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Bitmap of paired client slots.
    ClientSlots,
    /// Name of the client paired in `slot`.
    ClientDetails { slot: u8 },
    /// Outlet and controller settings.
    DeviceSettings,
    /// Current timer and outlet state.
    DeviceState,
    /// Controller nickname.
    Nickname,
    /// Outlet limits.
    OutletSettings,
    /// Preset stored in `slot`.
    PresetDetails { slot: u8 },
    /// Bitmap of stored preset slots.
    PresetSlots,
    /// Hardware and firmware revisions.
    TechnicalInfo,
    /// Register a new client. Sent unauthenticated.
    PairClient { client_id: u32, name: String },
    /// Remove the client paired in `slot`.
    UnpairClient { slot: u8 },
    /// Switch outlets and set the target temperature in °C.
    ControlOutlets {
        outlet1: bool,
        outlet2: bool,
        temperature: f64,
    },
    /// Start the preset stored in `slot`.
    StartPreset { slot: u8 },
}

impl Command {
    /// Operation name, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ClientSlots => "client_slots",
            Command::ClientDetails { .. } => "client_details",
            Command::DeviceSettings => "device_settings",
            Command::DeviceState => "device_state",
            Command::Nickname => "nickname",
            Command::OutletSettings => "outlet_settings",
            Command::PresetDetails { .. } => "preset_details",
            Command::PresetSlots => "preset_slots",
            Command::TechnicalInfo => "technical_info",
            Command::PairClient { .. } => "pair_client",
            Command::UnpairClient { .. } => "unpair_client",
            Command::ControlOutlets { .. } => "control_outlets",
            Command::StartPreset { .. } => "start_preset",
        }
    }
}
