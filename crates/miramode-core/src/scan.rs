//! Device discovery and scanning.
//!
//! Mira Mode controllers advertise a name and a vendor service from the
//! same UUID family as the control characteristics. Identification is
//! best-effort: a scan can also list every BLE device in range.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
use crate::uuid::MIRA_WRITE;

/// Address reported by platforms that hide the MAC (macOS).
const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Information about a discovered controller.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// The advertised name.
    pub name: Option<String>,
    /// The peripheral ID for connecting.
    pub id: PeripheralId,
    /// The BLE address as a string (may be zeros on macOS, use `identifier` instead).
    pub address: String,
    /// A connection identifier (peripheral ID on macOS, address on other platforms).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
    /// Whether the advertisement looks like a Mira Mode controller.
    pub is_mira: bool,
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Only return devices that appear to be Mira Mode controllers.
    pub filter_mira_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            filter_mira_only: true,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Set whether to filter for Mira Mode controllers only.
    #[must_use]
    pub fn filter_mira_only(mut self, filter: bool) -> Self {
        self.filter_mira_only = filter;
        self
    }

    /// Scan for all BLE devices.
    #[must_use]
    pub fn all_devices(self) -> Self {
        self.filter_mira_only(false)
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await.map_err(adapter_unavailable)?;
    let adapters = manager.adapters().await.map_err(adapter_unavailable)?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// The BLE stack could not hand out an adapter at all.
fn adapter_unavailable(err: btleplug::Error) -> Error {
    debug!("Bluetooth adapter unavailable: {}", err);
    Error::connection_failed(None, ConnectionFailureReason::AdapterUnavailable)
}

/// Scan for controllers in range.
///
/// An empty list means nothing was found; it is not an error.
///
/// # Errors
///
/// Returns an error if:
/// - No Bluetooth adapter is available
/// - The scan could not be started or stopped
pub async fn scan_for_devices() -> Result<Vec<DiscoveredDevice>> {
    scan_with_options(ScanOptions::default()).await
}

/// Scan for devices with custom options.
pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, options).await
}

/// Scan for devices using a specific adapter.
#[tracing::instrument(level = "info", skip_all, fields(duration_secs = options.duration.as_secs()))]
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!("Starting BLE scan...");

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match process_peripheral(&peripheral, options.filter_mira_only).await {
            Ok(Some(device)) => {
                info!("Found device: {:?}", device.name);
                discovered.push(device);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Error processing peripheral: {}", e);
            }
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

async fn process_peripheral(
    peripheral: &Peripheral,
    filter_mira_only: bool,
) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let is_mira = is_mira_device(&properties);
    if filter_mira_only && !is_mira {
        return Ok(None);
    }

    let id = peripheral.id();
    let address = properties.address.to_string();
    let identifier = create_identifier(&address, &id);

    Ok(Some(DiscoveredDevice {
        name: properties.local_name,
        id,
        address,
        identifier,
        rssi: properties.rssi,
        is_mira,
    }))
}

/// Whether `uuid` belongs to the Mira Mode vendor UUID family.
///
/// The family shares everything but the leading 32 bits with the control
/// characteristics.
pub fn is_mira_uuid(uuid: &Uuid) -> bool {
    uuid.as_bytes()[4..] == MIRA_WRITE.as_bytes()[4..]
}

fn is_mira_device(properties: &PeripheralProperties) -> bool {
    if properties.services.iter().any(is_mira_uuid)
        || properties.service_data.keys().any(is_mira_uuid)
    {
        return true;
    }

    properties
        .local_name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().contains("mira"))
}

/// Find a specific device by name or address.
pub async fn find_device(identifier: &str) -> Result<(Adapter, Peripheral)> {
    find_device_with_options(identifier, ScanOptions::default()).await
}

/// Find a specific device by name or address with custom options.
///
/// 1. Checks peripherals the adapter already knows about
/// 2. Performs up to 3 scan attempts with increasing durations
///
/// Advertisements are easily missed, so a single short scan is not enough.
#[tracing::instrument(level = "info", skip(options))]
pub async fn find_device_with_options(
    identifier: &str,
    options: ScanOptions,
) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;
    let identifier_lower = identifier.to_lowercase();

    if let Some(peripheral) = find_peripheral_by_identifier(&adapter, &identifier_lower).await? {
        info!("Found device in cache (no scan needed)");
        return Ok((adapter, peripheral));
    }

    let max_attempts: u32 = 3;
    let base_duration = options.duration.as_millis() as u64 / 2;
    let base_duration = Duration::from_millis(base_duration.max(2000));

    for attempt in 1..=max_attempts {
        let scan_duration = base_duration * attempt;
        info!(
            "Scan attempt {}/{} ({}s)...",
            attempt,
            max_attempts,
            scan_duration.as_secs()
        );

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(scan_duration).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) =
            find_peripheral_by_identifier(&adapter, &identifier_lower).await?
        {
            info!("Found device on attempt {}", attempt);
            return Ok((adapter, peripheral));
        }

        if attempt < max_attempts {
            warn!("Device not found, retrying...");
        }
    }

    warn!(
        "Device not found after {} attempts: {}",
        max_attempts, identifier
    );
    Err(Error::device_not_found(identifier))
}

async fn find_peripheral_by_identifier(
    adapter: &Adapter,
    identifier_lower: &str,
) -> Result<Option<Peripheral>> {
    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Ok(Some(props)) = peripheral.properties().await {
            let address = props.address.to_string();
            let peripheral_id = format_peripheral_id(&peripheral.id());
            if matches_identifier(
                &address,
                &peripheral_id,
                props.local_name.as_deref(),
                identifier_lower,
            ) {
                debug!("Matched {} ({})", peripheral_id, address);
                return Ok(Some(peripheral));
            }
        }
    }

    Ok(None)
}

/// Whether a peripheral matches a lowercase name/address/ID identifier.
///
/// Peripheral IDs and names match by substring; addresses match exactly,
/// with or without colons.
fn matches_identifier(
    address: &str,
    peripheral_id: &str,
    name: Option<&str>,
    identifier_lower: &str,
) -> bool {
    if identifier_lower.is_empty() {
        return false;
    }

    if peripheral_id.to_lowercase().contains(identifier_lower) {
        return true;
    }

    let address = address.to_lowercase();
    if address != HIDDEN_ADDRESS
        && (address == identifier_lower
            || address.replace(':', "") == identifier_lower.replace(':', ""))
    {
        return true;
    }

    name.is_some_and(|n| n.to_lowercase().contains(identifier_lower))
}

/// Format a peripheral ID as a string.
///
/// Strips the `PeripheralId(...)` debug wrapper btleplug puts around it.
pub(crate) fn format_peripheral_id(id: &PeripheralId) -> String {
    strip_peripheral_wrapper(&format!("{:?}", id))
}

fn strip_peripheral_wrapper(debug: &str) -> String {
    debug
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// Uses the peripheral ID where the platform hides the address.
pub(crate) fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == HIDDEN_ADDRESS {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::{DEVICE_NAME, MIRA_NOTIFY};
    use uuid::uuid;

    #[test]
    fn test_scan_options_builder() {
        let options = ScanOptions::new().duration_secs(12).all_devices();
        assert_eq!(options.duration, Duration::from_secs(12));
        assert!(!options.filter_mira_only);
        assert!(ScanOptions::default().filter_mira_only);
    }

    #[test]
    fn test_adapter_unavailable_is_not_retried() {
        let err = adapter_unavailable(btleplug::Error::PermissionDenied);
        assert!(matches!(
            err,
            Error::ConnectionFailed {
                device_id: None,
                reason: ConnectionFailureReason::AdapterUnavailable,
            }
        ));
        assert!(!crate::retry::is_retryable(&err));
    }

    #[test]
    fn test_is_mira_uuid() {
        assert!(is_mira_uuid(&MIRA_WRITE));
        assert!(is_mira_uuid(&MIRA_NOTIFY));
        assert!(is_mira_uuid(&uuid!("bccb0001-ca66-11e5-88a4-0002a5d5c51b")));
        assert!(!is_mira_uuid(&DEVICE_NAME));
    }

    #[test]
    fn test_is_mira_device_by_name() {
        let props = PeripheralProperties {
            local_name: Some("Mira Mode".to_string()),
            ..Default::default()
        };
        assert!(is_mira_device(&props));

        let props = PeripheralProperties {
            local_name: Some("Headphones".to_string()),
            ..Default::default()
        };
        assert!(!is_mira_device(&props));
    }

    #[test]
    fn test_is_mira_device_by_service() {
        let props = PeripheralProperties {
            services: vec![uuid!("bccb0001-ca66-11e5-88a4-0002a5d5c51b")],
            ..Default::default()
        };
        assert!(is_mira_device(&props));
    }

    #[test]
    fn test_matches_identifier() {
        let address = "AA:BB:CC:DD:EE:FF";
        assert!(matches_identifier(address, "x", None, "aa:bb:cc:dd:ee:ff"));
        assert!(matches_identifier(address, "x", None, "aabbccddeeff"));
        assert!(!matches_identifier(address, "x", None, "aa:bb"));
        assert!(matches_identifier(address, "x", Some("Mira Mode"), "mira"));
        assert!(matches_identifier(
            HIDDEN_ADDRESS,
            "4F1C2A7E-0000-4000-8000-00AABBCCDDEE",
            None,
            "4f1c2a7e"
        ));
        assert!(!matches_identifier(HIDDEN_ADDRESS, "x", None, "00:00:00:00:00:00"));
        assert!(!matches_identifier(address, "x", Some("Mira"), ""));
    }

    #[test]
    fn test_strip_peripheral_wrapper() {
        assert_eq!(
            strip_peripheral_wrapper("PeripheralId(AA:BB:CC:DD:EE:FF)"),
            "AA:BB:CC:DD:EE:FF"
        );
        assert_eq!(strip_peripheral_wrapper("plain"), "plain");
    }
}
