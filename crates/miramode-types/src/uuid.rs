//! Bluetooth UUIDs for Mira Mode controllers.
//!
//! The controller exposes one custom characteristic pair for the control
//! protocol plus the standard GAP / Device Information strings.

use uuid::{Uuid, uuid};

// --- Mira Mode Characteristic UUIDs ---

/// Characteristic that accepts outbound protocol chunks.
pub const MIRA_WRITE: Uuid = uuid!("bccb0002-ca66-11e5-88a4-0002a5d5c51b");

/// Characteristic that delivers inbound protocol fragments as notifications.
pub const MIRA_NOTIFY: Uuid = uuid!("bccb0003-ca66-11e5-88a4-0002a5d5c51b");

// --- Device Information Characteristic UUIDs ---

/// Device name characteristic.
pub const DEVICE_NAME: Uuid = uuid!("00002a00-0000-1000-8000-00805f9b34fb");

/// Model number string characteristic.
pub const MODEL_NUMBER: Uuid = uuid!("00002a24-0000-1000-8000-00805f9b34fb");

/// Manufacturer name string characteristic.
pub const MANUFACTURER_NAME: Uuid = uuid!("00002a29-0000-1000-8000-00805f9b34fb");
