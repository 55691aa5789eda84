//! Turning a stored profile plus user input into something sendable.
//!
//! [`Target::from_profile`] validates the profile for the chosen version and
//! resolves the agent address; [`configure_pdu`] parses the OID (and SET
//! value) into a request PDU. Both run before anything touches the network,
//! so their failures are always input errors.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::profile::{AgentProfile, UsmProfile};
use crate::session::Retry;
use crate::value::ValueSyntax;
use crate::varbind::VarBind;
use crate::version::Version;

/// Shortest pass phrase USM accepts (RFC 3414 section 11.2).
pub const MIN_PASS_PHRASE_LEN: usize = 8;

/// The request a target and PDU are being built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Get,
    GetNext,
    Set { value: String, syntax: ValueSyntax },
}

impl Operation {
    /// Whether the write community applies.
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Set { .. })
    }
}

/// Version-specific credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum Security {
    Community(Bytes),
    Usm(UsmProfile),
}

/// Everything needed to address one request to one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Profile the target was built from, for messages.
    pub profile: String,
    pub addr: SocketAddr,
    pub version: Version,
    pub security: Security,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: Retry,
}

impl Target {
    /// Build a target for `version` from `profile`.
    ///
    /// Community versions use the read community, or the write community
    /// (falling back to read) when `write` is set.
    ///
    /// ```
    /// use snmp_poller::{AgentProfile, Target, Version};
    ///
    /// let profile = AgentProfile::community("lab", "127.0.0.1", Version::V2c, "public");
    /// let target = Target::from_profile(Version::V2c, &profile, false).unwrap();
    /// assert_eq!(target.addr.port(), 161);
    ///
    /// let mut broken = profile.clone();
    /// broken.read_community.clear();
    /// assert!(Target::from_profile(Version::V2c, &broken, false).is_err());
    /// ```
    pub fn from_profile(version: Version, profile: &AgentProfile, write: bool) -> Result<Self> {
        let security = match version {
            Version::V1 | Version::V2c => {
                let community = if write && !profile.write_community.is_empty() {
                    &profile.write_community
                } else {
                    &profile.read_community
                };
                if community.is_empty() {
                    return Err(Error::invalid_profile(&profile.name, "community string is empty"));
                }
                Security::Community(Bytes::copy_from_slice(community.as_bytes()))
            }
            Version::V3 => {
                validate_usm(&profile.name, &profile.usm)?;
                Security::Usm(profile.usm.clone())
            }
        };

        let addr = resolve(profile)?;

        Ok(Self {
            profile: profile.name.clone(),
            addr,
            version,
            security,
            timeout: profile.timeout(),
            retry: Retry::immediate(profile.retries),
        })
    }

    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn validate_usm(profile: &str, usm: &UsmProfile) -> Result<()> {
    if usm.security_name.is_empty() {
        return Err(Error::invalid_profile(profile, "security name is empty"));
    }
    if usm.security_level.requires_auth() {
        if usm.auth_protocol.is_none() {
            return Err(Error::invalid_profile(
                profile,
                format!("{} requires an authentication protocol", usm.security_level),
            ));
        }
        check_pass_phrase(profile, "authentication", &usm.auth_pass)?;
    }
    if usm.security_level.requires_privacy() {
        if usm.priv_protocol.is_none() {
            return Err(Error::invalid_profile(
                profile,
                format!("{} requires a privacy protocol", usm.security_level),
            ));
        }
        check_pass_phrase(profile, "privacy", &usm.priv_pass)?;
        if let (Some(auth), Some(privacy)) = (usm.auth_protocol, usm.priv_protocol)
            && privacy.key_len() > auth.digest_len()
        {
            return Err(Error::invalid_profile(
                profile,
                format!("{privacy:?} needs a longer key than {auth:?} can localize"),
            ));
        }
    }
    Ok(())
}

fn check_pass_phrase(profile: &str, which: &str, pass: &str) -> Result<()> {
    if pass.is_empty() {
        return Err(Error::invalid_profile(profile, format!("{which} pass phrase is empty")));
    }
    if pass.chars().count() < MIN_PASS_PHRASE_LEN {
        return Err(Error::invalid_profile(
            profile,
            format!("{which} pass phrase is shorter than {MIN_PASS_PHRASE_LEN} characters"),
        ));
    }
    Ok(())
}

fn resolve(profile: &AgentProfile) -> Result<SocketAddr> {
    let host = profile.address.trim();
    if host.is_empty() {
        return Err(Error::invalid_profile(&profile.name, "address is empty"));
    }
    // Bracketed IPv6 literals are accepted as well as bare ones.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    (host, profile.port)
        .to_socket_addrs()
        .map_err(|e| {
            Error::invalid_profile(&profile.name, format!("could not resolve '{host}': {e}"))
        })?
        .next()
        .ok_or_else(|| Error::invalid_profile(&profile.name, format!("could not resolve '{host}'")))
}

/// Parse `oid` and build the request PDU for `operation`.
///
/// Returns the parsed OID alongside the PDU so callers can remember the
/// walk root or report against it.
///
/// ```
/// use snmp_poller::{Operation, PduType, ValueSyntax, configure_pdu};
///
/// let (pdu, oid) = configure_pdu(&Operation::Get, ".1.3.6.1.2.1.1.1.0").unwrap();
/// assert_eq!(pdu.pdu_type, PduType::GetRequest);
/// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
///
/// let set = Operation::Set { value: "abc".into(), syntax: ValueSyntax::Integer };
/// assert!(configure_pdu(&set, "1.3.6.1.2.1.1.5.0").is_err());
/// ```
pub fn configure_pdu(operation: &Operation, oid: &str) -> Result<(Pdu, Oid)> {
    let oid = Oid::parse(oid)?;
    let pdu = match operation {
        Operation::Get => Pdu::get_request(std::slice::from_ref(&oid)),
        Operation::GetNext => Pdu::get_next_request(std::slice::from_ref(&oid)),
        Operation::Set { value, syntax } => {
            let value = syntax.parse(value)?;
            Pdu::set_request(vec![VarBind::new(oid.clone(), value)])
        }
    };
    Ok((pdu, oid))
}
