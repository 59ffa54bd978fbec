use crate::crc16::{crc16, format_crc};
use crate::models::ValidationReport;
use crate::reference::{CRC_VALUE_LEN, PAYLOAD_FORMAT_VALUE, TAG_PAYLOAD_FORMAT};

const MIN_QR_LEN: usize = 20;

/// Checks length, payload prefix and CRC trailer, stopping at the first
/// failure. Never panics; problems are reported in `errors`.
pub fn validate_emv_qr(qr: &str) -> ValidationReport {
    let chars: Vec<char> = qr.chars().collect();
    if chars.len() < MIN_QR_LEN {
        return ValidationReport::failed("QR muy corto");
    }
    let prefix = format!("{TAG_PAYLOAD_FORMAT}02{PAYLOAD_FORMAT_VALUE}");
    if !qr.starts_with(&prefix) {
        return ValidationReport::failed("Formato de payload incorrecto");
    }

    let split = chars.len() - CRC_VALUE_LEN;
    let received: String = chars[split..].iter().collect();
    // The checksum covers everything up to and including the `6304` header.
    let covered: String = chars[..split].iter().collect();
    let Some(crc) = crc16(&covered) else {
        return ValidationReport::failed("QR contiene caracteres fuera de Latin-1");
    };
    let expected = format_crc(crc);
    if expected != received {
        log::debug!("CRC mismatch: expected {} received {}", expected, received);
        return ValidationReport::failed(format!(
            "CRC inválido: esperado {}, recibido {}",
            expected, received
        ));
    }

    ValidationReport::passed(chars.len())
}
