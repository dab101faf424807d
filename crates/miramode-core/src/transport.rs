//! Transport abstraction consumed by [`Session`](crate::Session).
//!
//! A transport moves opaque bytes: it writes chunks to the controller's
//! write characteristic, delivers notification fragments to one callback,
//! and reads the standard identification strings. [`Device`](crate::Device)
//! implements it over btleplug; [`MockTransport`](crate::MockTransport)
//! implements it in memory for tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::uuid::{DEVICE_NAME, MANUFACTURER_NAME, MODEL_NUMBER};

/// Callback receiving raw notification fragments.
///
/// Called from the transport's delivery context; it must not block.
pub type FragmentCallback = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Read-only identification characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    /// GAP device name.
    DeviceName,
    /// Device Information model number.
    ModelNumber,
    /// Device Information manufacturer name.
    Manufacturer,
}

impl CharacteristicId {
    /// The characteristic's UUID.
    pub fn uuid(self) -> Uuid {
        match self {
            CharacteristicId::DeviceName => DEVICE_NAME,
            CharacteristicId::ModelNumber => MODEL_NUMBER,
            CharacteristicId::Manufacturer => MANUFACTURER_NAME,
        }
    }
}

/// Byte transport to a Mira Mode controller.
///
/// # Example
///
/// ```ignore
/// use miramode_core::{Transport, CharacteristicId, Result};
///
/// async fn model<T: Transport>(transport: &T) -> Result<Vec<u8>> {
///     transport.read_characteristic(CharacteristicId::ModelNumber).await
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one chunk to the write characteristic.
    async fn write(&self, chunk: &[u8]) -> Result<()>;

    /// Register the callback for notify-characteristic fragments.
    ///
    /// Fragments must be delivered in arrival order.
    async fn subscribe(&self, on_fragment: FragmentCallback) -> Result<()>;

    /// Read one identification characteristic.
    async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>>;
}
