//! SNMP values and the text syntaxes used to enter them.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::format::hex;
use crate::oid::Oid;

/// A variable-binding value, including the v2c exception values.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    /// Hundredths of a second.
    TimeTicks(u32),
    Opaque(Bytes),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    /// No object follows in the agent's view; ends a walk.
    EndOfMibView,
    /// Tag this crate does not interpret, kept verbatim.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned reading suitable for graphing.
    ///
    /// Counters, gauges, timeticks and non-negative integers convert; every
    /// other type (strings, OIDs, exceptions) yields `None`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => buf.push_tagged_bytes(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::NoSuchObject => buf.push_tagged_bytes(tag::context::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => buf.push_tagged_bytes(tag::context::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => buf.push_tagged_bytes(tag::context::END_OF_MIB_VIEW, &[]),
            Value::Unknown { tag, data } => buf.push_tagged_bytes(*tag, data),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match tag {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            tag::universal::NULL => {
                decoder.read_bytes(len)?;
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Value::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => {
                let data = decoder.read_bytes(len)?;
                let octets: [u8; 4] = data.as_ref().try_into().map_err(|_| {
                    decoder.malformed(DecodeErrorKind::InvalidIpAddressLength { length: len })
                })?;
                Value::IpAddress(octets)
            }
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_integer64_value(len)?),
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Value::NoSuchObject
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Value::NoSuchInstance
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Value::EndOfMibView
            }
            _ => Value::Unknown {
                tag,
                data: decoder.read_bytes(len)?,
            },
        };
        Ok(value)
    }
}

fn is_printable(text: &str) -> bool {
    text.chars()
        .all(|c| !c.is_control() || matches!(c, '\r' | '\n' | '\t'))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(text) if is_printable(text) => f.write_str(text),
                _ => write!(f, "0x{}", hex::Bytes(data)),
            },
            Value::Null => f.write_str("NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => write!(f, "{}", Ipv4Addr::from(*addr)),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "({}) {}d {}h {}m {}.{:02}s",
                    v,
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60,
                    v % 100
                )
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex::Bytes(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
            Value::EndOfMibView => f.write_str("endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{:02X}, data=0x{})", tag, hex::Bytes(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

/// How SET input text is interpreted.
///
/// The single-letter forms follow the net-snmp `snmpset` type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSyntax {
    /// `i`: INTEGER.
    Integer,
    /// `u`: Unsigned32 / Gauge32.
    Unsigned,
    /// `s`: OCTET STRING from text.
    #[default]
    String,
    /// `x`: OCTET STRING from hex digits.
    HexString,
    /// `o`: OBJECT IDENTIFIER.
    Oid,
    /// `a`: IpAddress.
    IpAddress,
    /// `t`: TimeTicks.
    TimeTicks,
    /// `c`: Counter32.
    Counter32,
    /// `C`: Counter64.
    Counter64,
}

impl ValueSyntax {
    pub fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Unsigned => "unsigned",
            Self::String => "string",
            Self::HexString => "hex-string",
            Self::Oid => "oid",
            Self::IpAddress => "ip-address",
            Self::TimeTicks => "timeticks",
            Self::Counter32 => "counter32",
            Self::Counter64 => "counter64",
        }
    }

    /// Parse `text` into a value of this syntax.
    ///
    /// ```
    /// use snmp_poller::{Value, ValueSyntax};
    ///
    /// assert_eq!(ValueSyntax::Integer.parse("-5").unwrap(), Value::Integer(-5));
    /// assert_eq!(ValueSyntax::IpAddress.parse("10.0.0.1").unwrap(), Value::IpAddress([10, 0, 0, 1]));
    /// assert!(ValueSyntax::Unsigned.parse("-5").is_err());
    /// ```
    pub fn parse(self, text: &str) -> Result<Value> {
        let invalid = || {
            Error::InvalidValue {
                syntax: self.name(),
                input: text.into(),
            }
            .boxed()
        };
        let trimmed = text.trim();

        let value = match self {
            Self::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid())?),
            Self::Unsigned => Value::Gauge32(trimmed.parse().map_err(|_| invalid())?),
            Self::String => Value::from(text),
            Self::HexString => Value::OctetString(hex::decode(trimmed).map_err(|_| invalid())?.into()),
            Self::Oid => Value::ObjectIdentifier(Oid::parse(trimmed).map_err(|_| invalid())?),
            Self::IpAddress => {
                let addr: Ipv4Addr = trimmed.parse().map_err(|_| invalid())?;
                Value::from(addr)
            }
            Self::TimeTicks => Value::TimeTicks(trimmed.parse().map_err(|_| invalid())?),
            Self::Counter32 => Value::Counter32(trimmed.parse().map_err(|_| invalid())?),
            Self::Counter64 => Value::Counter64(trimmed.parse().map_err(|_| invalid())?),
        };
        Ok(value)
    }
}

impl std::str::FromStr for ValueSyntax {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let syntax = match s {
            "i" | "integer" => Self::Integer,
            "u" | "unsigned" | "gauge" => Self::Unsigned,
            "s" | "string" => Self::String,
            "x" | "hex-string" => Self::HexString,
            "o" | "oid" => Self::Oid,
            "a" | "ip-address" => Self::IpAddress,
            "t" | "timeticks" => Self::TimeTicks,
            "c" | "counter32" => Self::Counter32,
            "C" | "counter64" => Self::Counter64,
            other => return Err(format!("unknown value type '{other}'")),
        };
        Ok(syntax)
    }
}

impl fmt::Display for ValueSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
