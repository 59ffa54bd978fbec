//! Tag-length-value fields of an EMV QR payload.
//!
//! Tags are two characters and lengths are two zero-padded decimal digits,
//! both counted in characters.

use crate::reference::MAX_VALUE_LEN;
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;

pub type ParsedFields = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("field {tag} is {length} characters long, at most 99 fit in the length prefix")]
    FieldTooLong { tag: String, length: usize },

    #[error("field {tag} contains '{ch}', only Latin-1 characters can be encoded")]
    UnsupportedCharacter { tag: String, ch: char },

    #[error("tag '{0}' must be two characters")]
    InvalidTag(String),

    #[error("field {tag} at position {position} has non-numeric length '{raw}'")]
    InvalidLength {
        tag: String,
        position: usize,
        raw: String,
    },

    #[error("field {tag} at position {position} declares {length} characters but only {available} remain")]
    Truncated {
        tag: String,
        position: usize,
        length: usize,
        available: usize,
    },

    #[error("unexpected end of data at position {0} while reading a field header")]
    UnexpectedEnd(usize),
}

/// Encodes one field. A missing value or an empty tag yields an empty string
/// so optional fields drop out of the payload.
pub fn encode_tlv<V: Display>(tag: &str, value: Option<V>) -> Result<String, TlvError> {
    let Some(value) = value else {
        return Ok(String::new());
    };
    if tag.is_empty() {
        return Ok(String::new());
    }
    if tag.chars().count() != 2 {
        return Err(TlvError::InvalidTag(tag.to_string()));
    }

    let value = value.to_string();
    if let Some(ch) = value.chars().find(|ch| u32::from(*ch) > 0xFF) {
        return Err(TlvError::UnsupportedCharacter {
            tag: tag.to_string(),
            ch,
        });
    }
    let length = value.chars().count();
    if length > MAX_VALUE_LEN {
        return Err(TlvError::FieldTooLong {
            tag: tag.to_string(),
            length,
        });
    }

    Ok(format!("{tag}{length:02}{value}"))
}

/// Encodes the present sub-fields and wraps them under `tag`. Returns an
/// empty string when no sub-field has a value.
pub fn encode_template(tag: &str, fields: &[(&str, Option<&str>)]) -> Result<String, TlvError> {
    let mut inner = String::new();
    for (sub_tag, value) in fields {
        inner.push_str(&encode_tlv(sub_tag, *value)?);
    }
    if inner.is_empty() {
        return Ok(String::new());
    }
    encode_tlv(tag, Some(inner))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: String,
    pub value: String,
    /// Position just past the value.
    pub next: usize,
}

/// Reads the field whose header starts at `cursor`.
pub fn read_field(chars: &[char], cursor: usize) -> Result<Field, TlvError> {
    if cursor + 4 > chars.len() {
        return Err(TlvError::UnexpectedEnd(cursor));
    }
    let tag: String = chars[cursor..cursor + 2].iter().collect();
    let raw_length: String = chars[cursor + 2..cursor + 4].iter().collect();
    let length = parse_length(&raw_length).ok_or_else(|| TlvError::InvalidLength {
        tag: tag.clone(),
        position: cursor,
        raw: raw_length.clone(),
    })?;

    let start = cursor + 4;
    let available = chars.len() - start;
    if length > available {
        return Err(TlvError::Truncated {
            tag,
            position: cursor,
            length,
            available,
        });
    }

    let value: String = chars[start..start + length].iter().collect();
    Ok(Field {
        tag,
        value,
        next: start + length,
    })
}

/// Decodes one level of a composite value such as tag `26` or `62`.
pub fn decode_template(value: &str) -> Result<ParsedFields, TlvError> {
    let chars: Vec<char> = value.chars().collect();
    let mut fields = ParsedFields::new();
    let mut cursor = 0;
    while cursor < chars.len() {
        let field = read_field(&chars, cursor)?;
        cursor = field.next;
        fields.insert(field.tag, field.value);
    }
    Ok(fields)
}

fn parse_length(raw: &str) -> Option<usize> {
    if raw.len() != 2 || !raw.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
