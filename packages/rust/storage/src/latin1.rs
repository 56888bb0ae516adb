//! ISO-8859-1 text codec.
//!
//! Every byte maps to the code point of the same value, so decoding never
//! fails. Encoding replaces characters above U+00FF with `?`.

/// Decode Latin-1 bytes into a `String`.
pub(crate) fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as Latin-1 bytes.
pub(crate) fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_high_bytes() {
        assert_eq!(decode(b"Am\xe9lie"), "Amélie");
        assert_eq!(decode(&[0xC3, 0xA9]), "Ã©");
    }

    #[test]
    fn encode_inverts_decode() {
        let raw = b"Se\xf1or de los Anillos \xa9";
        assert_eq!(encode(&decode(raw)), raw.to_vec());
    }

    #[test]
    fn encode_replaces_out_of_range() {
        assert_eq!(encode("東京"), b"??".to_vec());
        assert_eq!(encode("ok"), b"ok".to_vec());
    }
}
