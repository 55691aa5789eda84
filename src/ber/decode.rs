//! BER decoding.
//!
//! Zero-copy: every read slices the shared `Bytes` buffer.

use std::net::SocketAddr;

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result, UNKNOWN_TARGET};
use crate::oid::Oid;

/// BER reader over a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    target: Option<SocketAddr>,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            target: None,
        }
    }

    /// Decoder whose errors name `target` as the peer.
    pub fn with_target(data: Bytes, target: SocketAddr) -> Self {
        Self {
            data,
            offset: 0,
            target: Some(target),
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    pub(crate) fn target(&self) -> SocketAddr {
        self.target.unwrap_or(UNKNOWN_TARGET)
    }

    pub(crate) fn malformed(&self, kind: DecodeErrorKind) -> Box<Error> {
        tracing::debug!(target: "snmp_poller::ber", { snmp.offset = self.offset, snmp.decode_error = %kind }, "decode error");
        Error::malformed(self.target(), kind)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Next tag byte, not consumed.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.offset) else {
            return Err(self.malformed(DecodeErrorKind::TruncatedData));
        };
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset, self.target)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Slice `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(self.malformed(DecodeErrorKind::InsufficientData {
                needed: len,
                available: self.remaining(),
            }));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read a tag, fail unless it is `expected`, and return the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let tag = self.read_tag()?;
        if tag != expected {
            self.offset -= 1;
            return Err(self.malformed(DecodeErrorKind::UnexpectedTag {
                expected,
                actual: tag,
            }));
        }
        self.read_length()
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Signed integer content. Over-long values keep their first four bytes.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            tracing::warn!(target: "snmp_poller::ber", { snmp.offset = self.offset, length = len }, "integer too long, truncating to 4 bytes");
        }
        let bytes = self.read_bytes(len)?;
        let seed: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .take(4)
            .fold(seed, |acc, &b| (acc << 8) | b as i32))
    }

    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 5 {
            tracing::warn!(target: "snmp_poller::ber", { snmp.offset = self.offset, length = len }, "unsigned integer too long, truncating");
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .iter()
            .take(5)
            .fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }

    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.malformed(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            return Err(self.malformed(DecodeErrorKind::Integer64TooLong { length: len }));
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.malformed(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|_| self.malformed(DecodeErrorKind::InvalidOidEncoding))
    }

    /// Enter a SEQUENCE, returning a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Enter a constructed TLV with the given tag.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
            target: self.target,
        })
    }

    /// Skip one TLV without interpreting it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len).map(|_| ())
    }
}
