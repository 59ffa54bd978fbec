use rand::Rng;

pub fn random_digits<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let digit = rng.gen_range(0..10);
        out.push(char::from(b'0' + digit as u8));
    }
    out
}

pub fn random_alphanum_upper<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = rng.gen_range(0..CHARSET.len());
        out.push(char::from(CHARSET[idx]));
    }
    out
}

/// Formats `value` with two fraction digits the way JavaScript's
/// `toFixed(2)` does: exact binary value, ties away from zero.
pub fn format_amount(value: f64) -> String {
    if value == 0.0 {
        return "0.00".to_string();
    }
    let magnitude = value.abs();
    let scaled = magnitude * 100.0;
    // Only multiples of 1/8 can land exactly on a half cent.
    let exact_tie = (magnitude * 8.0).fract() == 0.0 && scaled.fract() == 0.5;
    if !exact_tie {
        return format!("{:.2}", value);
    }
    let rounded = (scaled.trunc() + 1.0) / 100.0;
    if value.is_sign_negative() {
        format!("-{:.2}", rounded)
    } else {
        format!("{:.2}", rounded)
    }
}

/// First `max` characters of `input`.
pub fn truncate_chars(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Percent-encodes `input` for a URL query value, keeping RFC 3986
/// unreserved characters.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
