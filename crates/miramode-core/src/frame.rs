//! Outbound frame construction and chunking.
//!
//! A frame is the request fields followed by their big-endian checksum,
//! salted with the client id (or [`MAGIC_ID`] for pairing). The transport
//! carries at most [`MTU`] bytes per write, so frames are split into
//! ordered chunks before sending.

use bytes::BufMut;
use tracing::debug;

use miramode_types::checksum::checksum;
use miramode_types::{
    ClientIdentity, MAGIC_ID, MAX_CLIENT_NAME_LEN, OUTLET_OFF, OUTLET_ON, TemperatureMapping,
};

use crate::commands::{self, Command};
use crate::error::{Error, Result};

/// Largest chunk the write characteristic accepts.
pub const MTU: usize = 20;

/// A complete outbound request, checksum included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// The full frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame is empty. Encoded frames never are.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split into ordered chunks of at most `size` bytes.
    ///
    /// Every chunk except possibly the last is exactly `size` bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `size` is outside `1..=MTU`.
    pub fn chunks(&self, size: usize) -> Result<std::slice::Chunks<'_, u8>> {
        validate_chunk_size(size)?;
        Ok(self.bytes.chunks(size))
    }

    /// Consume the frame, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Check that `size` is a usable chunk size.
pub fn validate_chunk_size(size: usize) -> Result<()> {
    if size == 0 || size > MTU {
        return Err(Error::invalid_config(format!(
            "chunk size {} outside 1..={}",
            size, MTU
        )));
    }
    Ok(())
}

/// Builds frames for the request catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    mapping: TemperatureMapping,
}

impl FrameEncoder {
    /// Create an encoder using `mapping` for temperature arguments.
    pub fn new(mapping: TemperatureMapping) -> Self {
        Self { mapping }
    }

    /// Encode `command` on behalf of `identity`.
    ///
    /// Pairing ignores `identity`; every other request requires one.
    ///
    /// # Errors
    ///
    /// - [`Error::NotPaired`] when a credentialed request has no identity.
    /// - [`Error::InvalidArgument`] for a pairing name over 20 UTF-8 bytes,
    ///   an unusable new client id, or a slot that overflows its selector.
    ///
    /// # Examples
    ///
    /// ```
    /// use miramode_core::{ClientIdentity, Command, FrameEncoder};
    ///
    /// let identity = ClientIdentity::new(12345, 1).unwrap();
    /// let frame = FrameEncoder::default()
    ///     .encode(Some(&identity), &Command::DeviceState)
    ///     .unwrap();
    /// assert_eq!(frame.as_bytes(), &[0x01, 0x07, 0x00, 0x23, 0x01]);
    /// ```
    pub fn encode(&self, identity: Option<&ClientIdentity>, command: &Command) -> Result<Frame> {
        let (fields, salt) = if let Command::PairClient { client_id, name } = command {
            (pair_fields(*client_id, name)?, MAGIC_ID)
        } else {
            let identity = identity.ok_or(Error::NotPaired)?;
            let fields = self.authenticated_fields(identity.client_slot(), command)?;
            (fields, identity.client_id())
        };

        let mut bytes = fields;
        let crc = checksum(&bytes, salt);
        bytes.put_u16(crc);

        debug!("Encoded {}: {:02x?}", command.name(), bytes);
        Ok(Frame { bytes })
    }

    fn authenticated_fields(&self, slot: u8, command: &Command) -> Result<Vec<u8>> {
        let fields = match command {
            Command::ClientSlots => vec![
                slot,
                commands::CLIENT_TABLE,
                0x01,
                commands::CLIENT_SLOTS_SELECTOR,
            ],
            Command::ClientDetails { slot: target } => vec![
                slot,
                commands::CLIENT_TABLE,
                0x01,
                selector(commands::CLIENT_DETAILS_BASE, *target, "client slot")?,
            ],
            Command::DeviceSettings => vec![slot, commands::DEVICE_SETTINGS, 0x00],
            Command::DeviceState => vec![slot, commands::DEVICE_STATE, 0x00],
            Command::Nickname => vec![slot, commands::NICKNAME, 0x00],
            Command::OutletSettings => vec![slot, commands::OUTLET_SETTINGS, 0x00],
            Command::PresetDetails { slot: target } => vec![
                slot,
                commands::PRESET_TABLE,
                0x01,
                selector(commands::PRESET_DETAILS_BASE, *target, "preset slot")?,
            ],
            Command::PresetSlots => vec![
                slot,
                commands::PRESET_TABLE,
                0x01,
                commands::PRESET_SLOTS_SELECTOR,
            ],
            Command::TechnicalInfo => vec![slot, commands::TECHNICAL_INFO, 0x01, 0x01],
            Command::UnpairClient { slot: target } => {
                vec![slot, commands::CLIENT_PAIRING, 0x01, *target]
            }
            Command::ControlOutlets {
                outlet1,
                outlet2,
                temperature,
            } => {
                let timer_mode = if *outlet1 || *outlet2 {
                    commands::TIMER_RUNNING
                } else {
                    commands::TIMER_PAUSED
                };
                vec![
                    slot,
                    commands::CONTROL_OUTLETS,
                    0x05,
                    timer_mode,
                    0x01,
                    self.mapping.encode(*temperature),
                    outlet_byte(*outlet1),
                    outlet_byte(*outlet2),
                ]
            }
            Command::StartPreset { slot: target } => {
                vec![slot, commands::START_PRESET, 0x01, *target]
            }
            Command::PairClient { client_id, name } => pair_fields(*client_id, name)?,
        };
        Ok(fields)
    }
}

fn pair_fields(client_id: u32, name: &str) -> Result<Vec<u8>> {
    if !miramode_types::types::is_valid_client_id(client_id) {
        return Err(Error::invalid_argument(format!(
            "client id {} cannot be assigned",
            client_id
        )));
    }
    let name = name.as_bytes();
    if name.len() > MAX_CLIENT_NAME_LEN {
        return Err(Error::invalid_argument(format!(
            "client name is {} bytes, at most {} allowed",
            name.len(),
            MAX_CLIENT_NAME_LEN
        )));
    }

    let mut fields = Vec::with_capacity(3 + commands::PAIR_LENGTH as usize + 2);
    fields.put_u8(0x00);
    fields.put_u8(commands::CLIENT_PAIRING);
    fields.put_u8(commands::PAIR_LENGTH);
    fields.put_u32(client_id);
    fields.put_slice(name);
    fields.put_bytes(0, MAX_CLIENT_NAME_LEN - name.len());
    Ok(fields)
}

fn selector(base: u8, slot: u8, what: &str) -> Result<u8> {
    base.checked_add(slot)
        .ok_or_else(|| Error::invalid_argument(format!("{} {} out of range", what, slot)))
}

fn outlet_byte(on: bool) -> u8 {
    if on { OUTLET_ON } else { OUTLET_OFF }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn encode(identity: &ClientIdentity, command: Command) -> Vec<u8> {
        FrameEncoder::default()
            .encode(Some(identity), &command)
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_query_frames() {
        let id = ClientIdentity::new(12345, 1).unwrap();
        assert_eq!(encode(&id, Command::DeviceState), hex("0107002301"));
        assert_eq!(encode(&id, Command::ClientSlots), hex("016b01006997"));
    }

    #[test]
    fn test_control_outlets_frame() {
        let id = ClientIdentity::new(40000, 2).unwrap();
        let frame = encode(
            &id,
            Command::ControlOutlets {
                outlet1: true,
                outlet2: false,
                temperature: 38.0,
            },
        );
        assert_eq!(frame, hex("02870501017c6400d675"));
    }

    #[test]
    fn test_control_outlets_timer_mode() {
        let id = ClientIdentity::new(40000, 2).unwrap();
        let off = encode(
            &id,
            Command::ControlOutlets {
                outlet1: false,
                outlet2: false,
                temperature: 38.0,
            },
        );
        assert_eq!(off[3], commands::TIMER_PAUSED);
        assert_eq!(&off[6..8], &[OUTLET_OFF, OUTLET_OFF]);

        let second = encode(
            &id,
            Command::ControlOutlets {
                outlet1: false,
                outlet2: true,
                temperature: 38.0,
            },
        );
        assert_eq!(second[3], commands::TIMER_RUNNING);
        assert_eq!(&second[6..8], &[OUTLET_OFF, OUTLET_ON]);
    }

    #[test]
    fn test_control_outlets_uses_mapping() {
        let id = ClientIdentity::new(40000, 2).unwrap();
        let frame = FrameEncoder::new(TemperatureMapping::Legacy)
            .encode(
                Some(&id),
                &Command::ControlOutlets {
                    outlet1: true,
                    outlet2: false,
                    temperature: 38.0,
                },
            )
            .unwrap();
        assert_eq!(frame.as_bytes()[5], 127);
    }

    #[test]
    fn test_pair_frame() {
        let frame = FrameEncoder::default()
            .encode(
                None,
                &Command::PairClient {
                    client_id: 40000,
                    name: "Rust client".to_string(),
                },
            )
            .unwrap();
        assert_eq!(
            frame.as_bytes(),
            hex("00eb1800009c405275737420636c69656e740000000000000000008feb")
        );
        assert_eq!(frame.chunks(MTU).unwrap().count(), 2);
    }

    #[test]
    fn test_pair_ignores_identity() {
        let id = ClientIdentity::new(12345, 4).unwrap();
        let command = Command::PairClient {
            client_id: 40000,
            name: "Rust client".to_string(),
        };
        let with = FrameEncoder::default().encode(Some(&id), &command).unwrap();
        let without = FrameEncoder::default().encode(None, &command).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_pair_name_limits() {
        let encoder = FrameEncoder::default();
        let exact = "x".repeat(MAX_CLIENT_NAME_LEN);
        assert!(
            encoder
                .encode(
                    None,
                    &Command::PairClient {
                        client_id: 1,
                        name: exact
                    }
                )
                .is_ok()
        );

        // 11 characters, 22 bytes.
        let long = "é".repeat(11);
        assert_eq!(long.len(), 22);
        let err = encoder
            .encode(
                None,
                &Command::PairClient {
                    client_id: 1,
                    name: long,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_pair_rejects_reserved_ids() {
        for client_id in [0, MAGIC_ID] {
            let err = FrameEncoder::default()
                .encode(
                    None,
                    &Command::PairClient {
                        client_id,
                        name: "a".to_string(),
                    },
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_unpair_and_start_preset_frames() {
        let id = ClientIdentity::new(40000, 3).unwrap();
        assert_eq!(
            encode(&id, Command::UnpairClient { slot: 5 }),
            hex("03eb0105d932")
        );
        assert_eq!(
            encode(&id, Command::StartPreset { slot: 0 }),
            hex("03b10100e3bc")
        );
    }

    #[test]
    fn test_selector_frames() {
        let id = ClientIdentity::new(12345, 1).unwrap();
        assert_eq!(&encode(&id, Command::ClientDetails { slot: 2 })[..4], &[1, 0x6b, 1, 0x12]);
        assert_eq!(&encode(&id, Command::PresetDetails { slot: 3 })[..4], &[1, 0x30, 1, 0x43]);
        assert_eq!(&encode(&id, Command::PresetSlots)[..4], &[1, 0x30, 1, 0x80]);
        assert_eq!(&encode(&id, Command::TechnicalInfo)[..4], &[1, 0x32, 1, 1]);
        assert_eq!(&encode(&id, Command::DeviceSettings)[..3], &[1, 0x3e, 0]);
        assert_eq!(&encode(&id, Command::Nickname)[..3], &[1, 0x44, 0]);
        assert_eq!(&encode(&id, Command::OutletSettings)[..3], &[1, 0x10, 0]);
    }

    #[test]
    fn test_selector_overflow_rejected() {
        let id = ClientIdentity::new(12345, 1).unwrap();
        let err = FrameEncoder::default()
            .encode(Some(&id), &Command::ClientDetails { slot: 250 })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_authenticated_request_without_identity() {
        let err = FrameEncoder::default()
            .encode(None, &Command::DeviceState)
            .unwrap_err();
        assert!(matches!(err, Error::NotPaired));
    }

    #[test]
    fn test_chunk_size_validation() {
        let id = ClientIdentity::new(12345, 1).unwrap();
        let frame = FrameEncoder::default()
            .encode(Some(&id), &Command::DeviceState)
            .unwrap();
        assert!(frame.chunks(0).is_err());
        assert!(frame.chunks(MTU + 1).is_err());
        assert_eq!(frame.chunks(2).unwrap().count(), 3);
    }
}
