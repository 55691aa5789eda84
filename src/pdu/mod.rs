//! SNMP protocol data units.
//!
//! Only the request/response PDUs an interactive manager exchanges are
//! modelled; notification PDUs are rejected as unknown.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    Report,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(Self::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Some(Self::GetNextRequest),
            tag::pdu::RESPONSE => Some(Self::Response),
            tag::pdu::SET_REQUEST => Some(Self::SetRequest),
            tag::pdu::REPORT => Some(Self::Report),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::GetRequest => tag::pdu::GET_REQUEST,
            Self::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            Self::Response => tag::pdu::RESPONSE,
            Self::SetRequest => tag::pdu::SET_REQUEST,
            Self::Report => tag::pdu::REPORT,
        }
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// A request or response PDU.
///
/// Requests are built with `request_id` 0; the session stamps a fresh id
/// on every send attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn request(pdu_type: PduType, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn get_request(oids: &[Oid]) -> Self {
        Self::request(
            PduType::GetRequest,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn get_next_request(oids: &[Oid]) -> Self {
        Self::request(
            PduType::GetNextRequest,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn set_request(varbinds: Vec<VarBind>) -> Self {
        Self::request(PduType::SetRequest, varbinds)
    }

    /// Response carrying `varbinds`, echoing this request's id.
    pub fn to_response(&self, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Error response echoing this request's bindings.
    pub fn to_error_response(&self, status: ErrorStatus, error_index: i32) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: status.as_i32(),
            error_index,
            varbinds: self.varbinds.clone(),
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let Some(pdu_type) = decoder.peek_tag().and_then(PduType::from_tag) else {
            let kind = match decoder.peek_tag() {
                Some(tag) => DecodeErrorKind::UnknownPduType(tag),
                None => DecodeErrorKind::TruncatedData,
            };
            return Err(decoder.malformed(kind));
        };

        let mut body = decoder.read_constructed(pdu_type.tag())?;
        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// OID of the binding named by the 1-based error index, if any.
    pub fn error_oid(&self) -> Option<Oid> {
        let index = usize::try_from(self.error_index).ok()?.checked_sub(1)?;
        self.varbinds.get(index).map(|vb| vb.oid.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[test]
    fn get_next_request_wire_form() {
        let mut pdu = Pdu::get_next_request(&[oid!(1, 3, 6, 1)]);
        pdu.request_id = 5;
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        assert_eq!(
            buf.finish().as_ref(),
            &[
                0xA1, 0x14, 0x02, 0x01, 0x05, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x09,
                0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00
            ]
        );
    }

    #[test]
    fn response_decodes_error_fields() {
        let request = Pdu::set_request(vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("x"))]);
        let response = request.to_error_response(ErrorStatus::NotWritable, 1);

        let mut buf = EncodeBuf::new();
        response.encode(&mut buf);
        let decoded = Pdu::decode(&mut Decoder::new(buf.finish())).unwrap();

        assert_eq!(decoded.pdu_type, PduType::Response);
        assert!(decoded.is_error());
        assert_eq!(decoded.error_status_enum(), ErrorStatus::NotWritable);
        assert_eq!(decoded.error_oid(), Some(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
    }

    #[test]
    fn trap_pdu_is_rejected() {
        let err = Pdu::decode(&mut Decoder::from_slice(&[0xA7, 0x00])).unwrap_err();
        assert!(matches!(
            *err,
            crate::Error::MalformedResponse { kind: DecodeErrorKind::UnknownPduType(0xA7), .. }
        ));
    }

    #[test]
    fn error_oid_ignores_out_of_range_index() {
        let mut pdu = Pdu::get_request(&[oid!(1, 3, 6, 1)]);
        pdu.error_index = 0;
        assert_eq!(pdu.error_oid(), None);
        pdu.error_index = 4;
        assert_eq!(pdu.error_oid(), None);
    }
}
