//! Core BLE library for Kohler Mira Mode digital showers.
//!
//! This crate speaks the Mira Mode control protocol over Bluetooth Low
//! Energy: it discovers controllers, frames and checksums commands,
//! reassembles fragmented notifications, and correlates each request with
//! the notification that answers it.
//!
//! # Features
//!
//! - **Device discovery**: Scan for nearby controllers via BLE
//! - **Client pairing**: Register a client id and slot with the controller
//! - **Shower state**: Outlets, temperatures and the running timer
//! - **Control**: Switch outlets, set temperature, start presets
//! - **Configuration queries**: Nickname, presets, outlet and device settings
//! - **Retry logic**: Configurable backoff for flaky connections
//! - **In-memory transport**: Drive a [`Session`] without hardware in tests
//!
//! # Layers
//!
//! | Layer | Type |
//! |-------|------|
//! | Link | [`Device`] (btleplug) or [`MockTransport`] |
//! | Framing | [`FrameEncoder`], [`Reassembler`] |
//! | Decoding | [`PayloadDecoder`] |
//! | Requests | [`Session`] |
//!
//! # Platform Differences
//!
//! On macOS, CoreBluetooth hides MAC addresses and devices are identified
//! by a per-host UUID instead. [`Device::address()`] returns whichever
//! identifier works for reconnecting on the current platform.
//!
//! # Quick Start
//!
//! ```no_run
//! use miramode_core::{ClientIdentity, Device, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Device::connect("AA:BB:CC:DD:EE:FF").await?;
//!     let identity = ClientIdentity::new(12345, 1)?;
//!     let mut session = Session::open(device, Some(identity), SessionConfig::default()).await?;
//!
//!     let state = session.device_state().await?;
//!     println!("Target: {:.1}°C", state.target_temperature);
//!
//!     session.control_outlets(true, false, 40.0).await?;
//!
//!     session.transport().disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod device;
pub mod error;
pub mod frame;
pub mod mock;
pub mod reassembly;
pub mod retry;
pub mod scan;
pub mod session;
pub mod transport;

pub use miramode_types::uuid;

pub use commands::Command;
pub use device::{ConnectionConfig, Device};
pub use error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
pub use frame::{Frame, FrameEncoder, MTU};
pub use mock::MockTransport;
pub use reassembly::{InboundPayload, Reassembler};
pub use retry::{RetryConfig, is_retryable, with_retry};
pub use scan::{DiscoveredDevice, ScanOptions};
pub use session::{Session, SessionConfig};
pub use transport::{CharacteristicId, FragmentCallback, Transport};

pub use miramode_types::uuid as uuids;
pub use miramode_types::{
    ClientIdentity, DeviceInfo, DeviceSettings, Event, Notification, OutletSettings, ParseError,
    PayloadDecoder, PresetDetails, ShowerState, TechnicalInformation, TemperatureMapping,
};
