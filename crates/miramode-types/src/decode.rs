//! Payload decoding.
//!
//! A reassembled payload carries no opcode; its meaning is inferred from
//! its length and, for the two ambiguous lengths, from its first byte:
//!
//! | len | first byte | event |
//! |-----|------------|-------|
//! | 1 | any | `SuccessOrFailure` |
//! | 2 | any | `Slots` |
//! | 4 | any | `DeviceSettings` |
//! | 10 | any | `DeviceState` |
//! | 11 | `0x01`, `0x80` | `ControlsOperated` |
//! | 11 | `0x00`, `0x04`, `0x08` | `OutletSettings` |
//! | 16 | `0x00` | `TechnicalInformation` |
//! | 16 | other | `Nickname` |
//! | 20 | any | `ClientDetails` |
//! | 24 | any | `PresetDetails` |
//!
//! Anything else is not an error; it simply produces no event.

use bytes::Buf;

use crate::error::{ParseError, ParseResult};
use crate::temperature::TemperatureMapping;
use crate::types::{
    DeviceSettings, Event, Notification, OUTLET_ON, OutletSettings, PresetDetails, ShowerState,
    TechnicalInformation, bit_indices,
};

/// Number of payload bytes a [`ShowerState`] occupies.
const SHOWER_STATE_LEN: usize = 10;

/// Decodes reassembled payloads into [`Notification`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadDecoder {
    mapping: TemperatureMapping,
}

impl PayloadDecoder {
    /// Create a decoder using `mapping` for every temperature field.
    pub fn new(mapping: TemperatureMapping) -> Self {
        Self { mapping }
    }

    /// The temperature mapping in use.
    pub fn mapping(&self) -> TemperatureMapping {
        self.mapping
    }

    /// Decode one complete payload.
    ///
    /// Returns `Ok(None)` for shapes outside the decode table.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidUtf8`] when a text field is not valid
    /// UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use miramode_types::{Event, PayloadDecoder};
    ///
    /// let decoder = PayloadDecoder::default();
    /// let n = decoder.decode(2, &[0x01]).unwrap().unwrap();
    /// assert_eq!(n.client_slot, 2);
    /// assert_eq!(n.event, Event::SuccessOrFailure { status: 1 });
    ///
    /// assert!(decoder.decode(2, &[0; 7]).unwrap().is_none());
    /// ```
    pub fn decode(&self, client_slot: u8, payload: &[u8]) -> ParseResult<Option<Notification>> {
        let event = match (payload.len(), payload.first().copied()) {
            (1, Some(status)) => Some(Event::SuccessOrFailure { status }),
            (2, _) => Some(Event::Slots {
                slots: bit_indices((&payload[..]).get_u16(), 16),
            }),
            (4, _) => Some(Event::DeviceSettings(DeviceSettings {
                outlets_enabled: bit_indices(payload[1].into(), 8),
                default_preset_slot: payload[2],
                controller_settings: bit_indices(payload[3].into(), 8),
            })),
            (10, _) => Some(Event::DeviceState(self.shower_state(payload)?)),
            (11, Some(flag @ (0x01 | 0x80))) => Some(Event::ControlsOperated {
                change_made: flag == 0x01,
                state: self.shower_state(&payload[1..])?,
            }),
            (11, Some(flag @ (0x00 | 0x04 | 0x08))) => {
                Some(Event::OutletSettings(OutletSettings {
                    outlet_flag: flag,
                    min_duration_seconds: payload[4],
                    max_temperature: self.mapping.decode(payload[6]),
                    min_temperature: self.mapping.decode(payload[8]),
                    update_counter: payload[10],
                }))
            }
            (16, Some(0x00)) => Some(Event::TechnicalInformation(TechnicalInformation {
                valve_type: payload[1],
                valve_sw_version: payload[3],
                ui_type: payload[5],
                ui_sw_version: payload[7],
                bt_sw_version: payload[15],
            })),
            (16, Some(_)) => Some(Event::Nickname {
                name: text("nickname", payload)?,
            }),
            (20, _) => Some(Event::ClientDetails {
                name: text("client name", payload)?,
            }),
            (24, _) => Some(Event::PresetDetails(PresetDetails {
                preset_slot: payload[0],
                target_temperature: self.mapping.decode(payload[2]),
                duration_seconds: payload[4],
                outlets_enabled: bit_indices(payload[5].into(), 8),
                name: text("preset name", &payload[8..])?,
            })),
            _ => None,
        };

        Ok(event.map(|event| Notification { client_slot, event }))
    }

    /// Parse the 10-byte timer/outlet block.
    ///
    /// Layout:
    /// - byte 0: timer state
    /// - byte 2: target temperature
    /// - byte 4: actual temperature
    /// - bytes 5-6: outlet 1 / outlet 2 (`0x64` = on)
    /// - bytes 7-8: remaining seconds (u16 BE)
    /// - byte 9: update counter
    fn shower_state(&self, data: &[u8]) -> ParseResult<ShowerState> {
        if data.len() < SHOWER_STATE_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: SHOWER_STATE_LEN,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let timer_state = buf.get_u8();
        buf.advance(1);
        let target_temperature = self.mapping.decode(buf.get_u8());
        buf.advance(1);
        let actual_temperature = self.mapping.decode(buf.get_u8());
        let outlet1 = buf.get_u8() == OUTLET_ON;
        let outlet2 = buf.get_u8() == OUTLET_ON;
        let remaining_seconds = buf.get_u16();
        let update_counter = buf.get_u8();

        Ok(ShowerState {
            timer_state,
            target_temperature,
            actual_temperature,
            outlet1,
            outlet2,
            remaining_seconds,
            update_counter,
        })
    }
}

/// Strict UTF-8 text with the device's trailing NUL padding removed.
fn text(field: &'static str, data: &[u8]) -> ParseResult<String> {
    let s = std::str::from_utf8(data).map_err(|source| ParseError::InvalidUtf8 { field, source })?;
    Ok(s.trim_end_matches('\0').to_string())
}
