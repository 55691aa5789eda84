//! Basic Encoding Rules codec for the SNMP subset this crate speaks.
//!
//! Encoding builds messages back to front in an [`EncodeBuf`], so every
//! length is known when its header is written. Decoding slices a shared
//! [`bytes::Bytes`] buffer without copying.

mod decode;
mod encode;
mod length;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length};

/// Tag bytes used by SNMP messages.
pub mod tag {
    /// ASN.1 universal class.
    pub mod universal {
        pub const INTEGER: u8 = 0x02;
        pub const OCTET_STRING: u8 = 0x04;
        pub const NULL: u8 = 0x05;
        pub const OBJECT_IDENTIFIER: u8 = 0x06;
        pub const SEQUENCE: u8 = 0x30;
    }

    /// SMIv2 application types.
    pub mod application {
        pub const IP_ADDRESS: u8 = 0x40;
        pub const COUNTER32: u8 = 0x41;
        pub const GAUGE32: u8 = 0x42;
        pub const TIMETICKS: u8 = 0x43;
        pub const OPAQUE: u8 = 0x44;
        pub const COUNTER64: u8 = 0x46;
    }

    /// Varbind exception values (RFC 3416).
    pub mod context {
        pub const NO_SUCH_OBJECT: u8 = 0x80;
        pub const NO_SUCH_INSTANCE: u8 = 0x81;
        pub const END_OF_MIB_VIEW: u8 = 0x82;
    }

    /// Constructed, context-specific PDU tags.
    pub mod pdu {
        pub const GET_REQUEST: u8 = 0xA0;
        pub const GET_NEXT_REQUEST: u8 = 0xA1;
        pub const RESPONSE: u8 = 0xA2;
        pub const SET_REQUEST: u8 = 0xA3;
        pub const TRAP_V1: u8 = 0xA4;
        pub const GET_BULK_REQUEST: u8 = 0xA5;
        pub const INFORM_REQUEST: u8 = 0xA6;
        pub const TRAP_V2: u8 = 0xA7;
        pub const REPORT: u8 = 0xA8;
    }
}
