//! SNMPv3 message framing (RFC 3412).
//!
//! ```text
//! SNMPv3Message ::= SEQUENCE {
//!     msgVersion INTEGER (3),
//!     msgGlobalData HeaderData,
//!     msgSecurityParameters OCTET STRING,
//!     msgData ScopedPduData
//! }
//! ```
//!
//! msgData is a plaintext [`ScopedPdu`] unless the privacy flag is set, in
//! which case it is an OCTET STRING holding the encrypted one.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Result};
use crate::pdu::Pdu;
use crate::profile::SecurityLevel;
use crate::v3::UsmSecurityParams;
use crate::version::Version;

/// msgMaxSize we advertise: the largest UDP payload.
pub const MSG_MAX_SIZE: i32 = 65_507;

/// Smallest msgMaxSize an engine may announce (RFC 3412).
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// The User-based Security Model's msgSecurityModel value.
const USM_SECURITY_MODEL: i32 = 3;

const FLAG_AUTH: u8 = 0x01;
const FLAG_PRIV: u8 = 0x02;
const FLAG_REPORTABLE: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// `None` for privacy without authentication.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let security_level = match (byte & FLAG_AUTH != 0, byte & FLAG_PRIV != 0) {
            (false, false) => SecurityLevel::NoAuthNoPriv,
            (true, false) => SecurityLevel::AuthNoPriv,
            (true, true) => SecurityLevel::AuthPriv,
            (false, true) => return None,
        };
        Some(Self::new(security_level, byte & FLAG_REPORTABLE != 0))
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = match self.security_level {
            SecurityLevel::NoAuthNoPriv => 0,
            SecurityLevel::AuthNoPriv => FLAG_AUTH,
            SecurityLevel::AuthPriv => FLAG_AUTH | FLAG_PRIV,
        };
        if self.reportable {
            byte |= FLAG_REPORTABLE;
        }
        byte
    }
}

/// HeaderData; the security model is always USM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub flags: MsgFlags,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size: MSG_MAX_SIZE,
            flags,
        }
    }

    fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(USM_SECURITY_MODEL);
            buf.push_octet_string(&[self.flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(seq.malformed(DecodeErrorKind::MsgMaxSizeTooSmall {
                value: msg_max_size,
            }));
        }
        let flags = seq.read_octet_string()?;
        let flags = match flags.as_ref() {
            [byte] => MsgFlags::from_byte(*byte),
            _ => None,
        }
        .ok_or_else(|| seq.malformed(DecodeErrorKind::InvalidMsgFlags))?;
        let model = seq.read_integer()?;
        if model != USM_SECURITY_MODEL {
            return Err(seq.malformed(DecodeErrorKind::UnknownSecurityModel(model)));
        }
        Ok(Self {
            msg_id,
            msg_max_size,
            flags,
        })
    }
}

/// `SEQUENCE { contextEngineID, contextName, PDU }`
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    fn encode_to(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64);
        self.encode_to(&mut buf);
        buf.finish()
    }

    /// Decode a scoped PDU. Trailing bytes (cipher padding) are ignored.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPduData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Encoded [`UsmSecurityParams`].
    pub security_params: Bytes,
    pub data: ScopedPduData,
}

impl V3Message {
    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn flags(&self) -> MsgFlags {
        self.global_data.flags
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            ScopedPduData::Plaintext(scoped) => Some(scoped),
            ScopedPduData::Encrypted(_) => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(128 + self.security_params.len());
        buf.push_sequence(|buf| {
            match &self.data {
                ScopedPduData::Plaintext(scoped) => scoped.encode_to(buf),
                ScopedPduData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(Version::V3.as_i32());
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
        let version = seq.read_integer()?;
        if version != Version::V3.as_i32() {
            return Err(seq.malformed(DecodeErrorKind::UnknownVersion(version)));
        }
        let global_data = MsgGlobalData::decode(&mut seq)?;
        let security_params = seq.read_octet_string()?;

        let encrypted = seq.peek_tag() == Some(tag::universal::OCTET_STRING);
        let data = match (global_data.flags.security_level.requires_privacy(), encrypted) {
            (true, true) => ScopedPduData::Encrypted(seq.read_octet_string()?),
            (false, false) => ScopedPduData::Plaintext(ScopedPdu::decode(&mut seq)?),
            (true, false) => return Err(seq.malformed(DecodeErrorKind::ExpectedEncryption)),
            (false, true) => return Err(seq.malformed(DecodeErrorKind::UnexpectedEncryption)),
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Decode msgSecurityParameters, naming `source` in errors.
    pub fn usm_params(&self, source: SocketAddr) -> Result<UsmSecurityParams> {
        UsmSecurityParams::decode(&mut Decoder::with_target(self.security_params.clone(), source))
    }

    /// Engine discovery request: noAuthNoPriv, reportable, empty USM
    /// parameters and an empty GetRequest.
    pub fn discovery_request(msg_id: i32) -> Self {
        let mut pdu = Pdu::get_request(&[]);
        pdu.request_id = msg_id;
        Self {
            global_data: MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true)),
            security_params: UsmSecurityParams::default().encode(),
            data: ScopedPduData::Plaintext(ScopedPdu::new(Bytes::new(), Bytes::new(), pdu)),
        }
    }
}
