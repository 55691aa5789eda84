//! Message framing: community-based v1/v2c and USM-secured v3.

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{MSG_MAX_SIZE, MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, V3Message};

use crate::ber::Decoder;
use crate::pdu::PduType;
use crate::version::Version;

/// Pull the correlation id out of an encoded message without decoding the
/// varbinds: the PDU request-id for v1/v2c, msgID for v3.
pub(crate) fn peek_request_id(data: &[u8]) -> Option<i32> {
    let mut decoder = Decoder::from_slice(data);
    let mut seq = decoder.read_sequence().ok()?;
    if seq.read_integer().ok()? == Version::V3.as_i32() {
        return seq.read_sequence().ok()?.read_integer().ok();
    }
    seq.read_octet_string().ok()?;
    let tag = seq.read_tag().ok()?;
    PduType::from_tag(tag)?;
    seq.read_length().ok()?;
    seq.read_integer().ok()
}
