//! BER encoding.
//!
//! Content is written in reverse: callers push the last element first, and
//! the constructed helpers prepend tag and length once the content length
//! is known. [`EncodeBuf::finish`] flips the buffer into wire order.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-order BER output buffer.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Prepend a run of bytes that is already in wire order.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..n]);
    }

    fn push_header(&mut self, tag: u8, len: usize) {
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Run `content` and wrap whatever it wrote in a constructed TLV.
    pub fn push_constructed(&mut self, tag: u8, content: impl FnOnce(&mut Self)) {
        let start = self.buf.len();
        content(self);
        let len = self.buf.len() - start;
        self.push_header(tag, len);
    }

    pub fn push_sequence(&mut self, content: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, content);
    }

    /// Signed INTEGER in minimal two's complement form.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 3 {
            let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
            let redundant_ones = bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0;
            if !(redundant_zero || redundant_ones) {
                break;
            }
            start += 1;
        }
        self.push_bytes(&bytes[start..]);
        self.push_header(tag::universal::INTEGER, 4 - start);
    }

    fn push_unsigned_content(&mut self, bytes: &[u8]) -> usize {
        let first = bytes
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(bytes.len() - 1);
        let content = &bytes[first..];
        self.push_bytes(content);
        if content[0] & 0x80 != 0 {
            self.push_byte(0x00);
            content.len() + 1
        } else {
            content.len()
        }
    }

    /// Unsigned 32-bit application value (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let len = self.push_unsigned_content(&value.to_be_bytes());
        self.push_header(tag, len);
    }

    /// Counter64.
    pub fn push_integer64(&mut self, value: u64) {
        let len = self.push_unsigned_content(&value.to_be_bytes());
        self.push_header(tag::application::COUNTER64, len);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_tagged_bytes(tag::universal::OCTET_STRING, data);
    }

    /// Primitive TLV with raw content.
    pub fn push_tagged_bytes(&mut self, tag: u8, data: &[u8]) {
        self.push_bytes(data);
        self.push_header(tag, data.len());
    }

    pub fn push_null(&mut self) {
        self.push_header(tag::universal::NULL, 0);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        let content = oid.to_ber();
        self.push_tagged_bytes(tag::universal::OBJECT_IDENTIFIER, &content);
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_tagged_bytes(tag::application::IP_ADDRESS, &addr);
    }

    /// Finish encoding and return the bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}
