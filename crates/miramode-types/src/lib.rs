//! Platform-agnostic protocol types for Mira Mode digital showers.
//!
//! This crate holds everything about the control protocol that does not
//! touch Bluetooth: the checksum, temperature byte mappings, the decoded
//! event model and the payload decoder. It is shared by `miramode-core`
//! and anything else that wants to speak the protocol over its own link.
//!
//! # Features
//!
//! - Salted CRC-16 frame check values
//! - Standard and legacy temperature mappings
//! - Decoded notification types
//! - UUID constants for BLE characteristics
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use miramode_types::{Event, PayloadDecoder};
//!
//! let decoder = PayloadDecoder::default();
//! let payload = [0x01, 0x00, 0x32, 0x00, 0x28, 0x64, 0x00, 0x00, 0x1E, 0x05];
//! let notification = decoder.decode(1, &payload).unwrap().unwrap();
//!
//! if let Event::DeviceState(state) = notification.event {
//!     assert!(state.outlet1);
//!     assert_eq!(state.remaining_seconds, 30);
//! }
//! ```

pub mod checksum;
pub mod decode;
pub mod error;
pub mod temperature;
pub mod types;
pub mod uuid;

pub use decode::PayloadDecoder;
pub use error::{ParseError, ParseResult};
pub use temperature::TemperatureMapping;
pub use types::{
    ClientIdentity, DeviceInfo, DeviceSettings, Event, MAGIC_ID, MAX_CLIENT_NAME_LEN,
    Notification, OUTLET_OFF, OUTLET_ON, OutletSettings, PresetDetails, STATUS_FAILURE,
    STATUS_SUCCESS, ShowerState, TechnicalInformation,
};
pub use uuid as uuids;
