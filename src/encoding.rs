//! Decoding of the legacy text files LTspice reads and writes.
//!
//! Schematics and ASCII raw files are single-byte text (treated as Latin-1 so
//! every byte maps to exactly one char). LTspice XVII can also emit UTF-16LE
//! raw files; those are recognised by a byte-order mark or by NUL high bytes.

/// Decode raw bytes into a `String`, never failing.
pub fn decode_text(bytes: &[u8]) -> String {
    if is_utf16le(bytes) {
        decode_utf16le(bytes)
    } else {
        decode_latin1(bytes)
    }
}

/// Latin-1 decode: byte `b` becomes `char::from(b)`.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Latin-1 encode. Returns `None` if a char lies outside U+0000..=U+00FF.
pub fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

fn is_utf16le(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return true;
    }
    // ASCII text encoded as UTF-16LE has a zero in every odd byte.
    bytes.len() >= 4 && bytes[0] != 0 && bytes[1] == 0 && bytes[2] != 0 && bytes[3] == 0
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
    let units = body
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
