//! BER definite-length headers (X.690 8.1.3).

use std::net::SocketAddr;

use crate::error::{DecodeErrorKind, Error, Result, UNKNOWN_TARGET};

/// Largest content length accepted while decoding.
pub const MAX_LENGTH: usize = 0x200000;

/// Encode a length header, returning its bytes in reverse order for prepending.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];
    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut count = 0;
    let mut rest = len;
    while rest > 0 {
        buf[count] = rest as u8;
        rest >>= 8;
        count += 1;
    }
    buf[count] = 0x80 | count as u8;
    (buf, count + 1)
}

/// Decode a length header, returning `(length, bytes consumed)`.
///
/// `base_offset` only feeds the debug log. The indefinite form is rejected.
pub fn decode_length(
    data: &[u8],
    base_offset: usize,
    target: Option<SocketAddr>,
) -> Result<(usize, usize)> {
    let malformed = |kind: DecodeErrorKind| {
        tracing::debug!(target: "snmp_poller::ber", { snmp.offset = base_offset, snmp.decode_error = %kind }, "bad length header");
        Error::malformed(target.unwrap_or(UNKNOWN_TARGET), kind)
    };

    let Some(&first) = data.first() else {
        return Err(malformed(DecodeErrorKind::TruncatedData));
    };

    if first == 0x80 {
        return Err(malformed(DecodeErrorKind::IndefiniteLength));
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets > 4 {
        return Err(malformed(DecodeErrorKind::LengthTooLong { octets }));
    }
    if data.len() < 1 + octets {
        return Err(malformed(DecodeErrorKind::TruncatedData));
    }

    let len = data[1..=octets]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(malformed(DecodeErrorKind::LengthExceedsMax {
            length: len,
            max: MAX_LENGTH,
        }));
    }
    Ok((len, 1 + octets))
}
