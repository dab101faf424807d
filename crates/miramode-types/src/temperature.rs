//! Single-byte temperature encoding.
//!
//! Temperatures travel as one byte on the wire. Two affine mappings exist
//! across controller firmware generations and a session must use exactly
//! one of them; which one a given model speaks is a configuration choice.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Affine mapping between degrees Celsius and the on-wire byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TemperatureMapping {
    /// `byte = celsius * 10 - 256`, covering 25.6 °C to 51.1 °C.
    #[default]
    Standard,
    /// `byte = celsius * 10.4 - 268`, used by one older protocol revision.
    Legacy,
}

impl TemperatureMapping {
    fn scale_and_offset(self) -> (f64, f64) {
        match self {
            TemperatureMapping::Standard => (10.0, 256.0),
            TemperatureMapping::Legacy => (10.4, 268.0),
        }
    }

    /// Encode a Celsius value, saturating outside the representable range.
    ///
    /// # Examples
    ///
    /// ```
    /// use miramode_types::TemperatureMapping;
    ///
    /// assert_eq!(TemperatureMapping::Standard.encode(38.0), 124);
    /// assert_eq!(TemperatureMapping::Standard.encode(10.0), 0);
    /// assert_eq!(TemperatureMapping::Standard.encode(80.0), 255);
    /// ```
    #[must_use]
    pub fn encode(self, celsius: f64) -> u8 {
        if celsius.is_nan() {
            return 0;
        }
        let (scale, offset) = self.scale_and_offset();
        (celsius * scale - offset).round_ties_even().clamp(0.0, 255.0) as u8
    }

    /// Decode an on-wire byte to degrees Celsius.
    #[must_use]
    pub fn decode(self, raw: u8) -> f64 {
        let (scale, offset) = self.scale_and_offset();
        (f64::from(raw) + offset) / scale
    }
}

impl fmt::Display for TemperatureMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureMapping::Standard => write!(f, "standard"),
            TemperatureMapping::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for TemperatureMapping {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(TemperatureMapping::Standard),
            "legacy" => Ok(TemperatureMapping::Legacy),
            other => Err(ParseError::InvalidValue(format!(
                "unknown temperature mapping '{}' (expected 'standard' or 'legacy')",
                other
            ))),
        }
    }
}
