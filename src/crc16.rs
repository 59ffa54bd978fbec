//! CRC16-CCITT trailer of the QR payload.
//!
//! Polynomial `0x1021`, initial value `0xFFFF`, no reflection and no final
//! XOR (catalogued as CRC-16/IBM-3740). Each character contributes one byte,
//! so only Latin-1 content can be checksummed.

use crc::{Crc, CRC_16_IBM_3740};

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

pub fn checksum(bytes: &[u8]) -> u16 {
    CCITT.checksum(bytes)
}

/// CRC over the characters of `input`, or `None` if a character is above U+00FF.
pub fn crc16(input: &str) -> Option<u16> {
    let bytes = latin1_bytes(input)?;
    Some(checksum(&bytes))
}

pub fn format_crc(value: u16) -> String {
    format!("{:04X}", value)
}

pub fn latin1_bytes(input: &str) -> Option<Vec<u8>> {
    input
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_answer() {
        assert_eq!(checksum(b"123456789"), 0x29B1);
        assert_eq!(crc16("123456789"), Some(0x29B1));
    }

    #[test]
    fn empty_input_is_initial_value() {
        assert_eq!(crc16(""), Some(0xFFFF));
    }

    #[test]
    fn latin1_characters_are_single_bytes() {
        assert_eq!(latin1_bytes("Ñ"), Some(vec![0xD1]));
        assert_eq!(crc16("Ñ"), Some(checksum(&[0xD1])));
    }

    #[test]
    fn wide_characters_are_rejected() {
        assert_eq!(crc16("€"), None);
    }

    #[test]
    fn format_is_zero_padded_uppercase() {
        assert_eq!(format_crc(0x0A1), "00A1");
        assert_eq!(format_crc(0xBEEF), "BEEF");
    }

    #[test]
    fn matches_bitwise_reference() {
        fn bitwise(input: &[u8]) -> u16 {
            let mut crc: u16 = 0xFFFF;
            for byte in input {
                crc ^= u16::from(*byte) << 8;
                for _ in 0..8 {
                    crc = if crc & 0x8000 != 0 {
                        (crc << 1) ^ 0x1021
                    } else {
                        crc << 1
                    };
                }
            }
            crc
        }

        let payload = b"00020101021226200004TEST0104COOP5204481453030325802AR6304";
        assert_eq!(checksum(payload), bitwise(payload));
    }
}
