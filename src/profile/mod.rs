//! Stored agent profiles.
//!
//! An [`AgentProfile`] describes one remote agent: where it lives, which
//! version to speak, and the credentials for that version. Profiles are
//! plain data; [`Target::from_profile`](crate::Target::from_profile) checks
//! that the fields needed for a request are actually present.

mod store;

pub use store::{ProfileStore, ProfilesFile};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Defaults used when a profile leaves a field out.
pub mod defaults {
    use std::time::Duration;

    pub const PORT: u16 = 161;
    pub const TIMEOUT: Duration = Duration::from_secs(5);
    pub const RETRIES: u32 = 3;
    pub const READ_COMMUNITY: &str = "public";
    pub const WRITE_COMMUNITY: &str = "private";
}

/// One remote agent and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    /// Key in the profile store; filled in on load.
    #[serde(skip)]
    pub name: String,
    /// Host name or IP address.
    pub address: String,
    pub port: u16,
    /// Preferred version when the caller does not force one.
    pub version: Version,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    pub retries: u32,
    pub read_community: String,
    /// Used for SET; falls back to `read_community` when empty.
    pub write_community: String,
    pub usm: UsmProfile,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            name: "localhost".into(),
            address: "127.0.0.1".into(),
            port: defaults::PORT,
            version: Version::V2c,
            timeout_secs: defaults::TIMEOUT.as_secs(),
            retries: defaults::RETRIES,
            read_community: defaults::READ_COMMUNITY.into(),
            write_community: defaults::WRITE_COMMUNITY.into(),
            usm: UsmProfile::default(),
        }
    }
}

impl AgentProfile {
    /// A v1/v2c profile for `address` with the given read community.
    pub fn community(
        name: impl Into<String>,
        address: impl Into<String>,
        version: Version,
        read_community: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            version,
            read_community: read_community.into(),
            ..Self::default()
        }
    }

    /// A v3 profile for `address` with the given USM parameters.
    pub fn usm(name: impl Into<String>, address: impl Into<String>, usm: UsmProfile) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            version: Version::V3,
            usm,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// SNMPv3 USM parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsmProfile {
    pub security_name: String,
    pub security_level: SecurityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_protocol: Option<AuthProtocol>,
    pub auth_pass: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priv_protocol: Option<PrivProtocol>,
    pub priv_pass: String,
    pub context_name: String,
}

impl UsmProfile {
    pub fn new(security_name: impl Into<String>) -> Self {
        Self {
            security_name: security_name.into(),
            ..Self::default()
        }
    }

    /// Enable authentication (authNoPriv unless privacy is also set).
    pub fn with_auth(mut self, protocol: AuthProtocol, pass: impl Into<String>) -> Self {
        self.auth_protocol = Some(protocol);
        self.auth_pass = pass.into();
        if self.security_level == SecurityLevel::NoAuthNoPriv {
            self.security_level = SecurityLevel::AuthNoPriv;
        }
        self
    }

    /// Enable privacy (authPriv).
    pub fn with_privacy(mut self, protocol: PrivProtocol, pass: impl Into<String>) -> Self {
        self.priv_protocol = Some(protocol);
        self.priv_pass = pass.into();
        self.security_level = SecurityLevel::AuthPriv;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityLevel {
    #[default]
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    pub fn requires_privacy(self) -> bool {
        self == Self::AuthPriv
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthNoPriv => f.write_str("noAuthNoPriv"),
            Self::AuthNoPriv => f.write_str("authNoPriv"),
            Self::AuthPriv => f.write_str("authPriv"),
        }
    }
}

/// USM authentication protocols (RFC 3414, RFC 7860).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthProtocol {
    Md5,
    #[serde(alias = "SHA1")]
    Sha,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl std::str::FromStr for AuthProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" => Ok(Self::Sha),
            "SHA224" => Ok(Self::Sha224),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(format!(
                "unknown authentication protocol '{s}'; expected MD5, SHA, SHA-224, SHA-256, SHA-384 or SHA-512"
            )),
        }
    }
}

/// USM privacy protocols (RFC 3414, RFC 3826).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrivProtocol {
    Des,
    #[serde(alias = "AES128")]
    Aes,
    Aes192,
    Aes256,
}

impl std::str::FromStr for PrivProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "DES" => Ok(Self::Des),
            "AES" | "AES128" => Ok(Self::Aes),
            "AES192" => Ok(Self::Aes192),
            "AES256" => Ok(Self::Aes256),
            _ => Err(format!(
                "unknown privacy protocol '{s}'; expected DES, AES, AES-192 or AES-256"
            )),
        }
    }
}
