//! Frame check value for outbound requests.
//!
//! Every request ends with a big-endian CRC-16/CCITT-FALSE computed over the
//! request fields followed by the big-endian client id. The client id is
//! never sent in the clear (outside pairing); it only salts the CRC.

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Feed `data` through the CRC register, MSB first.
fn update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        for bit in (0..8).rev() {
            let input = (byte >> bit) & 1 == 1;
            let top = crc & 0x8000 != 0;
            crc <<= 1;
            if input != top {
                crc ^= POLYNOMIAL;
            }
        }
    }
    crc
}

/// Plain CRC-16/CCITT-FALSE over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    update(INITIAL, data)
}

/// Compute the check value of `payload` salted with `salt`.
///
/// # Examples
///
/// ```
/// use miramode_types::checksum::checksum;
///
/// // Device state request for client slot 1, client id 12345.
/// assert_eq!(checksum(&[0x01, 0x07, 0x00], 12345), 0x2301);
/// ```
#[must_use]
pub fn checksum(payload: &[u8], salt: u32) -> u16 {
    update(update(INITIAL, payload), &salt.to_be_bytes())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn checksum_is_deterministic(data: Vec<u8>, salt: u32) {
            prop_assert_eq!(checksum(&data, salt), checksum(&data, salt));
        }

        /// Appending the big-endian CRC to a message makes the register zero.
        #[test]
        fn appended_crc_residue_is_zero(data: Vec<u8>) {
            let mut framed = data.clone();
            framed.extend_from_slice(&crc16(&data).to_be_bytes());
            prop_assert_eq!(crc16(&framed), 0);
        }
    }
}
