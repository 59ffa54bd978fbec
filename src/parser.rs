use crate::models::ParseOutcome;
use crate::reference::CRC_VALUE_LEN;
use crate::tlv::{read_field, ParsedFields, TlvError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Report truncated or malformed trailing fields instead of stopping
    /// quietly at them.
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Flat left-to-right parse. Composite fields (`26`, `62`) keep their raw
/// value; see [`crate::tlv::decode_template`] for one level of decoding.
pub fn parse_emv_qr(qr: &str) -> ParseOutcome {
    parse_emv_qr_with(qr, ParseOptions::default())
}

pub fn parse_emv_qr_with(qr: &str, options: ParseOptions) -> ParseOutcome {
    match scan(qr, options) {
        Ok(data) => ParseOutcome::parsed(data),
        Err(err) => ParseOutcome::failed(err.to_string()),
    }
}

fn scan(qr: &str, options: ParseOptions) -> Result<ParsedFields, TlvError> {
    let chars: Vec<char> = qr.chars().collect();
    let limit = chars.len().saturating_sub(CRC_VALUE_LEN);
    let mut data = ParsedFields::new();
    let mut cursor = 0;

    while cursor < limit {
        match read_field(&chars, cursor) {
            Ok(field) => {
                cursor = field.next;
                data.insert(field.tag, field.value);
            }
            Err(err) if options.strict => return Err(err),
            Err(err) => {
                log::debug!("parse stopped at position {}: {}", cursor, err);
                break;
            }
        }
    }

    Ok(data)
}
