//! Hexadecimal encoding and decoding.

use std::fmt;

/// Encode bytes as a lowercase hex string.
///
/// ```
/// use snmp_poller::format::hex::encode;
///
/// assert_eq!(encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    Bytes(bytes).to_string()
}

/// Decode hex digits into bytes.
///
/// Separators commonly found in pasted MAC addresses and dumps (spaces,
/// colons, dashes) are ignored, and an optional `0x` prefix is accepted.
///
/// ```
/// use snmp_poller::format::hex::decode;
///
/// assert_eq!(decode("00:1a:2B").unwrap(), vec![0x00, 0x1a, 0x2b]);
/// assert!(decode("abc").is_err());
/// assert!(decode("zz").is_err());
/// ```
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    let body = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut digits = Vec::with_capacity(body.len());
    for c in body.chars() {
        match c {
            ' ' | ':' | '-' => continue,
            c => digits.push(c.to_digit(16).ok_or(DecodeError::InvalidChar)? as u8),
        }
    }
    if !digits.len().is_multiple_of(2) {
        return Err(DecodeError::OddLength);
    }
    Ok(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

/// Error type for hex decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Digits do not pair up into whole bytes.
    OddLength,
    /// Not a hexadecimal digit.
    InvalidChar,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddLength => write!(f, "odd number of hex digits"),
            Self::InvalidChar => write!(f, "invalid hex digit"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Lazy hex formatter, so disabled log levels never allocate.
pub struct Bytes<'a>(pub &'a [u8]);

impl fmt::Display for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
