//! Community-based message framing (v1/v2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu PDU }`

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;

#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Wrap `pdu`; v3 is refused since it needs the USM message format.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Result<Self> {
        if !version.is_community() {
            return Err(
                Error::Unsupported(format!("{version} has no community message form").into()).boxed(),
            );
        }
        Ok(Self {
            version,
            community: community.into(),
            pdu,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.community.len());
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_from(Decoder::new(data))
    }

    /// Decode a datagram received from `source`.
    pub fn decode_from_peer(data: Bytes, source: SocketAddr) -> Result<Self> {
        Self::decode_from(Decoder::with_target(data, source))
    }

    fn decode_from(mut decoder: Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let raw_version = seq.read_integer()?;
        let version = match Version::from_i32(raw_version) {
            Some(v) if v.is_community() => v,
            _ => {
                return Err(seq.malformed(DecodeErrorKind::UnknownVersion(raw_version)));
            }
        };
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}
