//! BLE connection to a Mira Mode controller.
//!
//! [`Device`] owns a btleplug peripheral after service discovery and
//! implements [`Transport`] on top of it, so it can be handed straight to
//! [`Session::open`](crate::Session::open).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::retry::{RetryConfig, with_retry};
use crate::scan::{ScanOptions, create_identifier, find_device_with_options, format_peripheral_id};
use crate::transport::{CharacteristicId, FragmentCallback, Transport};
use crate::uuid::{MIRA_NOTIFY, MIRA_WRITE};

/// Default timeout for characteristic reads.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for characteristic writes.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for establishing a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan time when looking for a controller.
const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Timeouts for BLE connection and GATT operations.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use miramode_core::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .write_timeout(Duration::from_secs(5));
/// assert_eq!(config.connection_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to scan for the controller before connecting.
    pub scan_duration: Duration,
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for characteristic reads.
    pub read_timeout: Duration,
    /// Timeout for characteristic writes.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scan_duration: DEFAULT_SCAN_DURATION,
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Longer timeouts for a controller behind walls or far from the adapter.
    pub fn challenging_environment() -> Self {
        Self {
            scan_duration: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(25),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            discovery_timeout: Duration::from_secs(15),
        }
    }

    /// Short timeouts for quick failure detection.
    pub fn fast() -> Self {
        Self {
            scan_duration: Duration::from_secs(3),
            connection_timeout: Duration::from_secs(8),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(5),
        }
    }

    /// Set the scan duration.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// A connected Mira Mode controller.
///
/// Not `Clone`: the struct owns the connection and its notification task.
/// Share it behind an `Arc` if several tasks need it.
///
/// Call [`Device::disconnect`] before dropping. Dropping a connected device
/// logs a warning and disconnects in the background on a best-effort basis.
pub struct Device {
    /// Held so the peripheral's adapter outlives the connection.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    /// MAC address, or the peripheral ID where the platform hides it.
    address: String,
    characteristics_cache: RwLock<HashMap<Uuid, Characteristic>>,
    notification_handles: Mutex<Vec<JoinHandle<()>>>,
    disconnected: AtomicBool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Connect to a controller by name, address or peripheral ID.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use miramode_core::Device;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let device = Device::connect("AA:BB:CC:DD:EE:FF").await?;
    ///     println!("Connected to {:?}", device);
    ///     device.disconnect().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(identifier: &str) -> Result<Self> {
        Self::connect_with_config(identifier, ConnectionConfig::default()).await
    }

    /// Connect with custom timeouts.
    #[tracing::instrument(level = "info", skip_all, fields(identifier = %identifier))]
    pub async fn connect_with_config(identifier: &str, config: ConnectionConfig) -> Result<Self> {
        let options = ScanOptions::new()
            .duration(config.scan_duration)
            .all_devices();
        let (adapter, peripheral) = find_device_with_options(identifier, options).await?;
        Self::from_peripheral_with_config(adapter, peripheral, config).await
    }

    /// Connect, retrying transient failures.
    ///
    /// Pairs well with [`RetryConfig::for_connect`]. A controller that is
    /// not found at all is not retried.
    pub async fn connect_with_retry(
        identifier: &str,
        config: ConnectionConfig,
        retry: &RetryConfig,
    ) -> Result<Self> {
        with_retry(retry, "connect", || {
            Self::connect_with_config(identifier, config.clone())
        })
        .await
    }

    /// Create a Device from an already-discovered peripheral.
    pub async fn from_peripheral(adapter: Adapter, peripheral: Peripheral) -> Result<Self> {
        Self::from_peripheral_with_config(adapter, peripheral, ConnectionConfig::default()).await
    }

    /// Create a Device from an already-discovered peripheral with custom timeouts.
    #[tracing::instrument(level = "info", skip_all, fields(connect_timeout = ?config.connection_timeout))]
    pub async fn from_peripheral_with_config(
        adapter: Adapter,
        peripheral: Peripheral,
        config: ConnectionConfig,
    ) -> Result<Self> {
        info!("Connecting to device...");
        match timeout(config.connection_timeout, peripheral.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(connect_error(&peripheral, Some(e))),
            Err(_) => return Err(connect_error(&peripheral, None)),
        }
        info!("Connected!");

        debug!("Discovering services...");
        timeout(config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", config.discovery_timeout))??;

        let services = peripheral.services();
        debug!("Found {} services", services.len());

        let mut characteristics_cache = HashMap::new();
        for service in &services {
            debug!("  Service: {}", service.uuid);
            for characteristic in &service.characteristics {
                debug!("    Characteristic: {}", characteristic.uuid);
                characteristics_cache.insert(characteristic.uuid, characteristic.clone());
            }
        }

        let properties = peripheral.properties().await?;
        let name = properties.as_ref().and_then(|p| p.local_name.clone());
        let address = properties
            .as_ref()
            .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
            .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

        if !characteristics_cache.contains_key(&MIRA_WRITE) {
            warn!("Connected device has no Mira Mode write characteristic; is it a controller?");
        }

        Ok(Self {
            adapter,
            peripheral,
            name,
            address,
            characteristics_cache: RwLock::new(characteristics_cache),
            notification_handles: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
            config,
        })
    }

    /// Whether the BLE stack reports the link as up.
    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    /// The connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Abort notification tasks and disconnect.
    #[tracing::instrument(level = "info", skip(self), fields(device_name = ?self.name))]
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.disconnected.store(true, Ordering::SeqCst);

        for handle in self.notification_handles.lock().await.drain(..) {
            handle.abort();
        }

        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// The advertised name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The MAC address, or a platform identifier on macOS.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        if let Some(characteristic) = self.characteristics_cache.read().await.get(&uuid) {
            return Ok(characteristic.clone());
        }

        Err(Error::characteristic_not_found(
            uuid.to_string(),
            self.peripheral.services().len(),
        ))
    }

    /// Read a characteristic by UUID.
    pub async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.find_characteristic(uuid).await?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(&characteristic))
            .await
            .map_err(|_| {
                Error::timeout(format!("read characteristic {}", uuid), self.config.read_timeout)
            })??;
        Ok(data)
    }

    /// Write to a characteristic by UUID, with response.
    pub async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.find_characteristic(uuid).await?;
        timeout(
            self.config.write_timeout,
            self.peripheral
                .write(&characteristic, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(format!("write characteristic {}", uuid), self.config.write_timeout)
        })?
        .map_err(|e| Error::WriteFailed {
            uuid: uuid.to_string(),
            reason: e.to_string(),
        })
    }

    /// Subscribe to notifications on a characteristic.
    ///
    /// The callback runs on a spawned task for each notification, in
    /// arrival order. The task is aborted by [`Device::disconnect`].
    pub async fn subscribe_to_notifications<F>(&self, uuid: Uuid, callback: F) -> Result<()>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let characteristic = self.find_characteristic(uuid).await?;

        self.peripheral.subscribe(&characteristic).await?;
        let mut stream = self.peripheral.notifications().await?;

        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == uuid {
                    callback(&notification.value);
                }
            }
            debug!("Notification stream for {} ended", uuid);
        });

        self.notification_handles.lock().await.push(handle);
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        warn!(
            device_name = ?self.name,
            device_address = %self.address,
            "Device dropped without calling disconnect(); performing best-effort cleanup"
        );

        if let Ok(mut handles) = self.notification_handles.try_lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }

        let peripheral = self.peripheral.clone();
        let address = self.address.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = peripheral.disconnect().await {
                    debug!(device_address = %address, error = %e, "Best-effort disconnect failed");
                }
            });
        }
    }
}

#[async_trait]
impl Transport for Device {
    async fn write(&self, chunk: &[u8]) -> Result<()> {
        self.write_characteristic(MIRA_WRITE, chunk).await
    }

    async fn subscribe(&self, on_fragment: FragmentCallback) -> Result<()> {
        self.subscribe_to_notifications(MIRA_NOTIFY, on_fragment)
            .await
    }

    async fn read_characteristic(&self, id: CharacteristicId) -> Result<Vec<u8>> {
        Device::read_characteristic(self, id.uuid()).await
    }
}

/// A failed `connect()`; `None` means it timed out.
fn connect_error(peripheral: &Peripheral, cause: Option<btleplug::Error>) -> Error {
    connection_failure(format_peripheral_id(&peripheral.id()), cause)
}

fn connection_failure(device_id: String, cause: Option<btleplug::Error>) -> Error {
    let reason = match cause {
        Some(e) => ConnectionFailureReason::BleError(e.to_string()),
        None => ConnectionFailureReason::Timeout,
    };
    warn!("Connection to {} failed: {}", device_id, reason);
    Error::connection_failed(Some(device_id), reason)
}
