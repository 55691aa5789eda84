//! SNMP protocol versions.

use std::fmt;

/// Message version as carried in the first INTEGER of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Version {
    #[serde(rename = "v1", alias = "1")]
    V1,
    #[default]
    #[serde(rename = "v2c", alias = "2c")]
    V2c,
    #[serde(rename = "v3", alias = "3")]
    V3,
}

impl Version {
    pub fn as_i32(self) -> i32 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Version::V1),
            1 => Some(Version::V2c),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    /// Community-string versions.
    pub fn is_community(self) -> bool {
        matches!(self, Version::V1 | Version::V2c)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => f.write_str("v1"),
            Version::V2c => f.write_str("v2c"),
            Version::V3 => f.write_str("v3"),
        }
    }
}

impl std::str::FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2" | "2c" | "v2c" => Ok(Version::V2c),
            "3" | "v3" => Ok(Version::V3),
            other => Err(format!("unknown SNMP version '{other}'")),
        }
    }
}
