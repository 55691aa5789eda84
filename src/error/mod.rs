//! Error types for snmp-poller.
//!
//! - [`Error`] covers input validation, transport failures, SNMP protocol
//!   errors, graph management and profile persistence.
//! - [`ErrorStatus`] is the error-status code carried in response PDUs.
//! - [`GraphErrorKind`] narrows down why a sampling-feed call was rejected.
//! - [`DecodeErrorKind`] and [`AuthErrorKind`] say why a response was
//!   refused.
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_poller::{Error, Result};
//!
//! fn describe(result: Result<()>) -> String {
//!     match result {
//!         Ok(()) => "ok".into(),
//!         Err(e) => match &*e {
//!             Error::Timeout { target, retries, .. } => {
//!                 format!("{target} unreachable after {retries} retries")
//!             }
//!             Error::InvalidOid(text) => format!("bad OID {text}"),
//!             other => other.to_string(),
//!         },
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::oid::Oid;

/// Placeholder address used when a decode failure happens before the
/// peer is known.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Decode failures are logged with their offset and surfaced with the kind:
//
// tracing::debug!(
//     target: "snmp_poller::ber",
//     { snmp.offset = 42, snmp.decode_error = %DecodeErrorKind::ZeroLengthInteger },
//     "decode error"
// );
// return Err(Error::malformed(target, DecodeErrorKind::ZeroLengthInteger));

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Why a graph or curve operation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Graph names must be non-empty.
    EmptyName,
    /// A graph with this name already exists.
    DuplicateGraph,
    /// No graph with this name.
    UnknownGraph,
    /// No curve with this name in the graph.
    UnknownCurve,
    /// The graph already holds the maximum number of curves.
    GraphFull,
}

impl std::fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "empty graph name"),
            Self::DuplicateGraph => write!(f, "graph already exists"),
            Self::UnknownGraph => write!(f, "no such graph"),
            Self::UnknownCurve => write!(f, "no such curve"),
            Self::GraphFull => write!(f, "graph has no free curve slot"),
        }
    }
}

/// Why a response could not be decoded or was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Expected a different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data ended inside a TLV header.
    TruncatedData,
    /// Content is shorter than its length says.
    InsufficientData { needed: usize, available: usize },
    /// Indefinite length is not supported.
    IndefiniteLength,
    /// Length header uses more than four octets.
    LengthTooLong { octets: usize },
    /// Length is above [`MAX_LENGTH`](crate::ber::MAX_LENGTH).
    LengthExceedsMax { length: usize, max: usize },
    ZeroLengthInteger,
    Integer64TooLong { length: usize },
    /// NULL with non-zero length.
    InvalidNull,
    InvalidOidEncoding,
    InvalidIpAddressLength { length: usize },
    UnknownVersion(i32),
    UnknownPduType(u8),
    /// Response version differs from the request's.
    VersionMismatch,
    /// Response carried a request PDU.
    UnexpectedPduType(u8),
    RequestIdMismatch { expected: i32, actual: i32 },
    /// Privacy flag set without authentication.
    InvalidMsgFlags,
    UnknownSecurityModel(i32),
    /// msgMaxSize below the RFC 3412 minimum of 484 octets.
    MsgMaxSizeTooSmall { value: i32 },
    /// Engine boots or time outside 0..=2147483647.
    InvalidEngineClock,
    /// Authoritative engine did not report its engine ID.
    EmptyEngineId,
    /// Expected an encrypted scoped PDU.
    ExpectedEncryption,
    /// Expected a plaintext scoped PDU.
    UnexpectedEncryption,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => write!(f, "integer64 too long: {} bytes", length),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::VersionMismatch => write!(f, "version differs from the request"),
            Self::UnexpectedPduType(t) => write!(f, "unexpected PDU type 0x{:02X} in reply", t),
            Self::RequestIdMismatch { expected, actual } => {
                write!(f, "request ID mismatch: expected {}, got {}", expected, actual)
            }
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags: privacy without authentication"),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum 484", value)
            }
            Self::InvalidEngineClock => write!(f, "engine boots or time out of range"),
            Self::EmptyEngineId => write!(f, "empty authoritative engine ID"),
            Self::ExpectedEncryption => write!(f, "expected encrypted scoped PDU"),
            Self::UnexpectedEncryption => write!(f, "expected plaintext scoped PDU"),
        }
    }
}

/// Why an SNMPv3 exchange failed its security checks.
///
/// The `Unknown*`, `WrongDigest`, `NotInTimeWindow` and
/// `UnsupportedSecurityLevel` kinds come from the agent's usmStats
/// reports; the rest are found locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthErrorKind {
    UnsupportedSecurityLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    /// The agent could not verify our digest.
    WrongDigest,
    /// The agent could not decrypt our scoped PDU.
    DecryptionError,
    /// The reply's HMAC did not verify.
    HmacMismatch,
    /// The reply was not authenticated although we asked for it.
    MissingAuthentication,
    /// Reply auth params have the wrong length.
    WrongMacLength { expected: usize, actual: usize },
    /// Reply priv params or ciphertext could not be decrypted.
    DecryptionFailed,
    /// The privacy key cannot encrypt the request.
    EncryptionFailed,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSecurityLevel => write!(f, "unsupported security level"),
            Self::NotInTimeWindow => write!(f, "not in time window"),
            Self::UnknownUserName => write!(f, "unknown user name"),
            Self::UnknownEngineId => write!(f, "unknown engine ID"),
            Self::WrongDigest => write!(f, "wrong digest"),
            Self::DecryptionError => write!(f, "agent could not decrypt the request"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::MissingAuthentication => write!(f, "reply is not authenticated"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::DecryptionFailed => write!(f, "reply could not be decrypted"),
            Self::EncryptionFailed => write!(f, "request could not be encrypted"),
        }
    }
}

/// The error type for every fallible operation in the crate.
///
/// Input errors ([`InvalidProfile`](Error::InvalidProfile),
/// [`InvalidOid`](Error::InvalidOid), [`InvalidValue`](Error::InvalidValue))
/// are raised before anything is sent. The transport family
/// (`Network`, `Timeout`, `Snmp`, `Auth`, `MalformedResponse`, `Unsupported`,
/// `RequestFailed`) ends the current operation only.
///
/// ```
/// use snmp_poller::{Error, ErrorStatus};
///
/// fn is_transport(error: &Error) -> bool {
///     matches!(error,
///         Error::Timeout { .. } |
///         Error::Network { .. } |
///         Error::Auth { .. } |
///         Error::MalformedResponse { .. }
///     )
/// }
///
/// fn is_end_of_view(error: &Error) -> bool {
///     matches!(error, Error::Snmp { status: ErrorStatus::NoSuchName, .. })
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Agent profile lacks a field the selected version needs.
    #[error("invalid agent profile '{profile}': {reason}")]
    InvalidProfile { profile: Box<str>, reason: Box<str> },

    /// OID text could not be parsed.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// SET value text does not match its declared syntax.
    #[error("invalid {syntax} value: {input}")]
    InvalidValue {
        syntax: &'static str,
        input: Box<str>,
    },

    /// Network failure (unreachable, refused, bind failure).
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No response after all retries.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// The agent answered with a non-zero error-status.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// The agent rejected our credentials, or its reply failed our checks.
    #[error("authentication failed for {target}: {kind}")]
    Auth {
        target: SocketAddr,
        kind: AuthErrorKind,
    },

    /// Response could not be decoded or did not match the request.
    #[error("malformed response from {target}: {kind}")]
    MalformedResponse {
        target: SocketAddr,
        kind: DecodeErrorKind,
    },

    /// The task carrying a request ended without a result.
    #[error("request failed: {0}")]
    RequestFailed(Box<str>),

    /// The request needs something the bundled transport does not speak.
    #[error("unsupported: {0}")]
    Unsupported(Box<str>),

    /// Sampling feed graph or curve operation rejected.
    #[error("graph '{name}': {kind}")]
    Graph { name: Box<str>, kind: GraphErrorKind },

    /// Profile store could not be read or written.
    #[error("profile store {}: {source}", path.display())]
    ProfileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Profile store content is not valid JSON for the profile schema.
    #[error("profile store {}: {source}", path.display())]
    ProfileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub(crate) fn invalid_profile(profile: &str, reason: impl Into<Box<str>>) -> Box<Self> {
        Error::InvalidProfile {
            profile: profile.into(),
            reason: reason.into(),
        }
        .boxed()
    }

    pub(crate) fn malformed(target: SocketAddr, kind: DecodeErrorKind) -> Box<Self> {
        Error::MalformedResponse { target, kind }.boxed()
    }

    pub(crate) fn auth(target: SocketAddr, kind: AuthErrorKind) -> Box<Self> {
        Error::Auth { target, kind }.boxed()
    }

    pub(crate) fn graph(name: &str, kind: GraphErrorKind) -> Box<Self> {
        Error::Graph {
            name: name.into(),
            kind,
        }
        .boxed()
    }

    /// True for input errors that are rejected before anything is sent.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidProfile { .. } | Error::InvalidOid(_) | Error::InvalidValue { .. }
        )
    }
}

/// SNMP error-status codes (RFC 3416).
///
/// `NoSuchName` is how SNMPv1 agents signal the end of a walk; v2c agents use
/// the `endOfMibView` exception value instead.
///
/// ```
/// use snmp_poller::ErrorStatus;
///
/// let status = ErrorStatus::from_i32(2);
/// assert_eq!(status, ErrorStatus::NoSuchName);
/// assert_eq!(status.to_string(), "noSuchName");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Code outside the RFC range.
    Unknown(i32),
}

const STATUS_TABLE: [(ErrorStatus, &str); 19] = [
    (ErrorStatus::NoError, "noError"),
    (ErrorStatus::TooBig, "tooBig"),
    (ErrorStatus::NoSuchName, "noSuchName"),
    (ErrorStatus::BadValue, "badValue"),
    (ErrorStatus::ReadOnly, "readOnly"),
    (ErrorStatus::GenErr, "genErr"),
    (ErrorStatus::NoAccess, "noAccess"),
    (ErrorStatus::WrongType, "wrongType"),
    (ErrorStatus::WrongLength, "wrongLength"),
    (ErrorStatus::WrongEncoding, "wrongEncoding"),
    (ErrorStatus::WrongValue, "wrongValue"),
    (ErrorStatus::NoCreation, "noCreation"),
    (ErrorStatus::InconsistentValue, "inconsistentValue"),
    (ErrorStatus::ResourceUnavailable, "resourceUnavailable"),
    (ErrorStatus::CommitFailed, "commitFailed"),
    (ErrorStatus::UndoFailed, "undoFailed"),
    (ErrorStatus::AuthorizationError, "authorizationError"),
    (ErrorStatus::NotWritable, "notWritable"),
    (ErrorStatus::InconsistentName, "inconsistentName"),
];

impl ErrorStatus {
    /// Create from the raw status code.
    pub fn from_i32(value: i32) -> Self {
        match usize::try_from(value).ok().and_then(|i| STATUS_TABLE.get(i)) {
            Some((status, _)) => *status,
            None => {
                tracing::warn!(target: "snmp_poller::error", { snmp.error_status = value }, "unknown SNMP error status");
                Self::Unknown(value)
            }
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown(code) => *code,
            known => STATUS_TABLE
                .iter()
                .position(|(status, _)| status == known)
                .map(|i| i as i32)
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = STATUS_TABLE
                    .iter()
                    .find(|(status, _)| status == known)
                    .map(|(_, name)| *name)
                    .unwrap_or("unknown");
                f.write_str(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Result<()>>(),
            std::mem::size_of::<*const ()>(),
        );
    }

    #[test]
    fn status_codes_map_both_ways() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::from_i32(-1).as_i32(), -1);
        assert_eq!(ErrorStatus::NotWritable.to_string(), "notWritable");
        assert_eq!(ErrorStatus::Unknown(42).to_string(), "unknown(42)");
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(Error::InvalidOid("x".into()).is_input_error());
        assert!(Error::invalid_profile("lab", "no community").is_input_error());
        assert!(!Error::Unsupported("v3".into()).is_input_error());
    }

    #[test]
    fn graph_error_message_names_graph() {
        let err = Error::graph("cpu", GraphErrorKind::GraphFull);
        assert_eq!(err.to_string(), "graph 'cpu': graph has no free curve slot");
    }

    #[test]
    fn malformed_response_names_the_reason() {
        let target: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let err = Error::malformed(target, DecodeErrorKind::UnexpectedTag { expected: 0x30, actual: 0x04 });
        assert_eq!(
            err.to_string(),
            "malformed response from 192.0.2.1:161: expected tag 0x30, got 0x04"
        );

        let err = Error::auth(target, AuthErrorKind::UnknownUserName);
        assert_eq!(err.to_string(), "authentication failed for 192.0.2.1:161: unknown user name");
    }
}
