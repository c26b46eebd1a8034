//! Encoding of the individual protocol fields.
//!
//! Integers travel as decimal text, key names as exactly three ASCII
//! characters, and secrets as raw bytes decoded from operator-supplied
//! base32.

use crate::error::ProtocolError;
use crate::{BASE32_BLOCK_LEN, KEY_NAME_LEN};
use data_encoding::{Encoding, Specification};
use std::fmt;
use std::sync::OnceLock;

/// RFC 4648 base32 alphabet.
const BASE32_SYMBOLS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encodes an integer as decimal text with no leading zeros.
pub fn encode_integer(value: i64) -> String {
    value.to_string()
}

/// Parses a decimal integer, ignoring surrounding whitespace.
pub fn parse_integer(text: &str) -> Result<i64, ProtocolError> {
    text.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidInteger(text.to_string()))
}

/// Parses the key count the device sends in reply to `get`.
pub fn parse_count(text: &str) -> Result<usize, ProtocolError> {
    text.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidCount(text.to_string()))
}

/// Right-pads base32 text with `=` until its length is a multiple of 8.
pub fn pad_base32(input: &str) -> String {
    let mut padded = input.to_string();
    while padded.len() % BASE32_BLOCK_LEN != 0 {
        padded.push('=');
    }
    padded
}

fn base32() -> &'static Encoding {
    static BASE32: OnceLock<Encoding> = OnceLock::new();
    BASE32.get_or_init(|| {
        let mut alphabet = Specification::new();
        alphabet.symbols.push_str(BASE32_SYMBOLS);
        alphabet.padding = Some('=');
        // Unused low bits in the last symbol are ignored, not rejected.
        alphabet.check_trailing_bits = false;
        alphabet.encoding().expect("static base32 specification")
    })
}

/// A key name as stored on the device: exactly three ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyName(String);

impl KeyName {
    /// Truncates `input` to three characters and space-pads it on the right.
    pub fn new(input: &str) -> Result<Self, ProtocolError> {
        let mut name: String = input.chars().take(KEY_NAME_LEN).collect();
        if name.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) {
            return Err(ProtocolError::InvalidKeyName(input.to_string()));
        }
        while name.len() < KEY_NAME_LEN {
            name.push(' ');
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw key material. Never treated as text.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Pads `input` to a whole base32 block and decodes it.
    pub fn from_base32(input: &str) -> Result<Self, ProtocolError> {
        let padded = pad_base32(input);
        base32()
            .decode(padded.as_bytes())
            .map(Self)
            .map_err(|e| ProtocolError::InvalidKeyEncoding(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_name_padding() {
        assert_eq!(KeyName::new("AB").unwrap().as_str(), "AB ");
        assert_eq!(KeyName::new("").unwrap().as_str(), "   ");
        assert_eq!(KeyName::new("GHB").unwrap().as_str(), "GHB");
    }

    #[test]
    fn test_key_name_truncation() {
        assert_eq!(KeyName::new("github").unwrap().as_str(), "git");
    }

    #[test]
    fn test_key_name_rejects_line_breaks() {
        assert!(matches!(
            KeyName::new("a\nb"),
            Err(ProtocolError::InvalidKeyName(_))
        ));
        // Only the first three characters matter.
        assert!(KeyName::new("abc\n").is_ok());
    }

    #[test]
    fn test_key_name_rejects_non_ascii() {
        assert!(KeyName::new("äb").is_err());
    }

    #[test]
    fn test_pad_base32() {
        assert_eq!(pad_base32("MFRGG"), "MFRGG===");
        assert_eq!(pad_base32("MFRGGZDF"), "MFRGGZDF");
        assert_eq!(pad_base32("MFRGGZDFM"), "MFRGGZDFM=======");
        assert_eq!(pad_base32(""), "");
    }

    #[test]
    fn test_secret_from_base32() {
        let secret = Secret::from_base32("MFRGG").unwrap();
        assert_eq!(secret.as_bytes(), b"abc");

        let secret = Secret::from_base32("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(secret.as_bytes(), b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn test_secret_keeps_non_utf8_bytes() {
        let secret = Secret::from_base32("74").unwrap();
        assert_eq!(secret.as_bytes(), &[0xffu8]);
    }

    #[test]
    fn test_secret_invalid_alphabet() {
        assert!(matches!(
            Secret::from_base32("!!!"),
            Err(ProtocolError::InvalidKeyEncoding(_))
        ));
        assert!(Secret::from_base32("mfrgg").is_err());
    }

    #[test]
    fn test_secret_impossible_length() {
        // 1, 3 and 6 symbols cannot encode a whole number of bytes.
        assert!(Secret::from_base32("M").is_err());
        assert!(Secret::from_base32("MFR").is_err());
        assert!(Secret::from_base32("MFRGGZ").is_err());
    }

    #[test]
    fn test_secret_debug_hides_material() {
        let secret = Secret::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", secret), "Secret(3 bytes)");
    }

    #[test]
    fn test_integers() {
        assert_eq!(encode_integer(0), "0");
        assert_eq!(encode_integer(1700000000), "1700000000");
        assert_eq!(parse_integer("42\r\n").unwrap(), 42);
        assert!(parse_integer("4 2").is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3\r\n").unwrap(), 3);
        assert_eq!(parse_count("0").unwrap(), 0);
        assert!(matches!(
            parse_count("-1"),
            Err(ProtocolError::InvalidCount(_))
        ));
        assert!(parse_count("ERR").is_err());
    }

    proptest! {
        #[test]
        fn prop_key_name_is_three_bytes(input in "[ -~]{0,3}") {
            let name = KeyName::new(&input).unwrap();
            prop_assert_eq!(name.as_str().len(), KEY_NAME_LEN);
            prop_assert!(name.as_str().starts_with(input.as_str()));
        }

        #[test]
        fn prop_pad_base32_reaches_block(input in "[A-Z2-7]{0,40}") {
            let padded = pad_base32(&input);
            prop_assert_eq!(padded.len() % BASE32_BLOCK_LEN, 0);
            prop_assert!(padded.len() - input.len() < BASE32_BLOCK_LEN);
            prop_assert!(padded.starts_with(input.as_str()));
        }

        #[test]
        fn prop_timestamp_survives_encoding(ts in 0i64..=i64::MAX) {
            prop_assert_eq!(parse_integer(&encode_integer(ts)).unwrap(), ts);
        }
    }
}
