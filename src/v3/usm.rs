//! USM security parameters (RFC 3414 §2.4).
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            ..Self::default()
        }
    }

    /// Zeroed auth params of `mac_len` bytes, filled in after encoding.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.engine_id.len() + self.username.len());
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode the content of msgSecurityParameters.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let engine_id = seq.read_octet_string()?;
        let engine_boots = read_clock(&mut seq)?;
        let engine_time = read_clock(&mut seq)?;
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }
}

fn read_clock(seq: &mut Decoder) -> Result<u32> {
    let value = seq.read_integer()?;
    u32::try_from(value).map_err(|_| seq.malformed(DecodeErrorKind::InvalidEngineClock))
}

/// Locate msgAuthenticationParameters in an encoded v3 message.
///
/// Returns the absolute offset and length of the parameter's content, so
/// the HMAC can be written or checked in place.
pub fn find_auth_params(message: &[u8]) -> Result<(usize, usize)> {
    let mut decoder = Decoder::from_slice(message);
    // Offsets stay absolute because every header is read on one decoder.
    decoder.expect_tag(tag::universal::SEQUENCE)?;
    let len = decoder.expect_tag(tag::universal::INTEGER)?;
    decoder.read_bytes(len)?;
    let len = decoder.expect_tag(tag::universal::SEQUENCE)?;
    decoder.read_bytes(len)?;
    decoder.expect_tag(tag::universal::OCTET_STRING)?;
    decoder.expect_tag(tag::universal::SEQUENCE)?;
    for _ in 0..4 {
        decoder.skip_tlv()?;
    }
    let len = decoder.expect_tag(tag::universal::OCTET_STRING)?;
    let offset = decoder.offset();
    decoder.read_bytes(len)?;
    Ok((offset, len))
}
