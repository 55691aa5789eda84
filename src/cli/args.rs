//! Command-line arguments for the `snmp-poller` binary.
//!
//! Every command resolves one [`AgentProfile`]: either a stored profile
//! picked with `--profile`, or the built-in default, with individual fields
//! overridden by flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::Version;
use crate::error::Result;
use crate::profile::{AgentProfile, AuthProtocol, PrivProtocol, ProfileStore, SecurityLevel};
use crate::session::{Backoff, Retry};
use crate::value::ValueSyntax;

/// SNMP version for CLI argument parsing.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SnmpVersion {
    /// SNMPv1
    #[value(name = "1")]
    V1,
    /// SNMPv2c
    #[value(name = "2c")]
    V2c,
    /// SNMPv3
    #[value(name = "3")]
    V3,
}

impl From<SnmpVersion> for Version {
    fn from(v: SnmpVersion) -> Self {
        match v {
            SnmpVersion::V1 => Version::V1,
            SnmpVersion::V2c => Version::V2c,
            SnmpVersion::V3 => Version::V3,
        }
    }
}

/// Backoff strategy for CLI argument parsing.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum BackoffStrategy {
    /// Retry as soon as an attempt times out.
    #[default]
    None,
    /// Fixed delay between each retry.
    Fixed,
    /// Exponential backoff: delay doubles after each attempt.
    Exponential,
}

/// SET type specifier, as in the net-snmp `snmpset` type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    /// INTEGER (i32)
    #[value(name = "i")]
    Integer,
    /// Unsigned32/Gauge32 (u32)
    #[value(name = "u")]
    Unsigned,
    /// STRING (OctetString from UTF-8)
    #[value(name = "s")]
    String,
    /// Hex-STRING (OctetString from hex)
    #[value(name = "x")]
    HexString,
    /// OBJECT IDENTIFIER
    #[value(name = "o")]
    Oid,
    /// IpAddress
    #[value(name = "a")]
    IpAddress,
    /// TimeTicks
    #[value(name = "t")]
    TimeTicks,
    /// Counter32
    #[value(name = "c")]
    Counter32,
    /// Counter64
    #[value(name = "C")]
    Counter64,
}

impl From<ValueType> for ValueSyntax {
    fn from(t: ValueType) -> Self {
        match t {
            ValueType::Integer => ValueSyntax::Integer,
            ValueType::Unsigned => ValueSyntax::Unsigned,
            ValueType::String => ValueSyntax::String,
            ValueType::HexString => ValueSyntax::HexString,
            ValueType::Oid => ValueSyntax::Oid,
            ValueType::IpAddress => ValueSyntax::IpAddress,
            ValueType::TimeTicks => ValueSyntax::TimeTicks,
            ValueType::Counter32 => ValueSyntax::Counter32,
            ValueType::Counter64 => ValueSyntax::Counter64,
        }
    }
}

/// Top-level parser.
#[derive(Debug, Parser)]
#[command(name = "snmp-poller", version, about = "Query and sample SNMP agents")]
pub struct Cli {
    #[command(flatten)]
    pub agent: AgentArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a single object.
    Get {
        /// OID of the object.
        oid: String,
    },
    /// Fetch the lexicographic successor of an OID.
    #[command(name = "getnext")]
    GetNext {
        /// Starting OID.
        oid: String,
    },
    /// Write a single object.
    Set {
        /// OID of the object.
        oid: String,
        /// Type specifier: i, u, s, x, o, a, t, c, C.
        #[arg(value_name = "TYPE")]
        value_type: ValueType,
        /// Value text, interpreted according to TYPE.
        value: String,
    },
    /// Walk every object under a subtree.
    Walk {
        /// Root of the subtree.
        #[arg(default_value = "1.3.6.1.2.1")]
        oid: String,
    },
    /// Walk a conceptual table and print it as rows and columns.
    Table {
        /// OID of the table object.
        oid: String,
    },
    /// Sample numeric objects on a fixed cadence and print the history.
    Poll {
        /// Number of samples to collect.
        #[arg(long = "ticks", default_value = "5")]
        ticks: u32,
        /// Seconds between samples.
        #[arg(short = 'i', long = "interval", default_value = "1")]
        interval: f64,
        /// OIDs to sample; each becomes one curve.
        #[arg(required = true)]
        oids: Vec<String>,
    },
    /// List, save, or remove stored agent profiles.
    Profiles {
        /// Save the resolved profile under NAME.
        #[arg(long = "save", value_name = "NAME", conflicts_with = "remove")]
        save: Option<String>,
        /// Remove the profile stored under NAME.
        #[arg(long = "remove", value_name = "NAME")]
        remove: Option<String>,
    },
}

/// Which agent to talk to and how.
#[derive(Debug, Default, Args)]
pub struct AgentArgs {
    /// Stored profile to start from.
    #[arg(short = 'p', long = "profile", global = true)]
    pub profile: Option<String>,

    /// Profile store location (default: the user's config directory).
    #[arg(long = "profiles", value_name = "PATH", global = true)]
    pub profiles_path: Option<PathBuf>,

    /// Agent host name or address.
    #[arg(short = 'H', long = "host", global = true)]
    pub host: Option<String>,

    /// Agent UDP port.
    #[arg(long = "port", global = true)]
    pub port: Option<u16>,

    /// SNMP version: 1, 2c, or 3.
    #[arg(short = 'v', long = "snmp-version", global = true)]
    pub snmp_version: Option<SnmpVersion>,

    /// Read community (v1/v2c).
    #[arg(short = 'c', long = "community", global = true)]
    pub community: Option<String>,

    /// Write community used for SET (v1/v2c).
    #[arg(short = 'w', long = "write-community", global = true)]
    pub write_community: Option<String>,

    /// Request timeout in seconds.
    #[arg(short = 't', long = "timeout", global = true)]
    pub timeout: Option<u64>,

    /// Retry count.
    #[arg(short = 'r', long = "retries", global = true)]
    pub retries: Option<u32>,

    /// Backoff strategy between retries: none, fixed, or exponential.
    #[arg(long = "backoff", global = true)]
    pub backoff: Option<BackoffStrategy>,

    /// Backoff delay in milliseconds (initial delay for exponential, fixed delay otherwise).
    #[arg(long = "backoff-delay", default_value = "1000", global = true)]
    pub backoff_delay: u64,

    /// Maximum backoff delay in milliseconds (exponential only).
    #[arg(long = "backoff-max", default_value = "5000", global = true)]
    pub backoff_max: u64,

    /// Jitter factor for exponential backoff (0.0-1.0, e.g., 0.25 means +/-25%).
    #[arg(long = "backoff-jitter", default_value = "0.25", global = true)]
    pub backoff_jitter: f64,

    #[command(flatten)]
    pub v3: V3Args,
}

/// SNMPv3 security arguments.
#[derive(Debug, Default, Args)]
pub struct V3Args {
    /// Security name/username (implies -v 3).
    #[arg(short = 'u', long = "username", global = true)]
    pub username: Option<String>,

    /// Security level: noAuthNoPriv, authNoPriv, or authPriv.
    #[arg(short = 'l', long = "level", value_parser = parse_security_level, global = true)]
    pub level: Option<SecurityLevel>,

    /// Authentication protocol: MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512.
    #[arg(short = 'a', long = "auth-protocol", global = true)]
    pub auth_protocol: Option<AuthProtocol>,

    /// Authentication passphrase.
    #[arg(short = 'A', long = "auth-password", global = true)]
    pub auth_password: Option<String>,

    /// Privacy protocol: DES, AES, AES-192, AES-256.
    #[arg(short = 'x', long = "priv-protocol", global = true)]
    pub priv_protocol: Option<PrivProtocol>,

    /// Privacy passphrase.
    #[arg(short = 'X', long = "priv-password", global = true)]
    pub priv_password: Option<String>,

    /// Context name.
    #[arg(short = 'n', long = "context", global = true)]
    pub context: Option<String>,
}

fn parse_security_level(s: &str) -> std::result::Result<SecurityLevel, String> {
    match s.to_ascii_lowercase().as_str() {
        "noauthnopriv" => Ok(SecurityLevel::NoAuthNoPriv),
        "authnopriv" => Ok(SecurityLevel::AuthNoPriv),
        "authpriv" => Ok(SecurityLevel::AuthPriv),
        _ => Err(format!(
            "invalid security level '{s}'; expected noAuthNoPriv, authNoPriv or authPriv"
        )),
    }
}

impl AgentArgs {
    /// Where profiles are read from and saved to.
    pub fn profiles_path(&self) -> PathBuf {
        self.profiles_path
            .clone()
            .unwrap_or_else(ProfileStore::default_path)
    }

    /// Load the profile store.
    pub fn store(&self) -> Result<ProfileStore> {
        ProfileStore::load(self.profiles_path())
    }

    /// The profile named by `--profile` (or the default one) with every
    /// flag given on the command line applied on top.
    ///
    /// Fails when `--profile` names a profile the store does not have.
    pub fn resolve_profile(&self, store: &ProfileStore) -> std::result::Result<AgentProfile, String> {
        let mut profile = match &self.profile {
            Some(name) => store
                .get(name)
                .cloned()
                .ok_or_else(|| format!("no stored profile named '{name}'"))?,
            None => AgentProfile::default(),
        };
        self.apply(&mut profile);
        Ok(profile)
    }

    fn apply(&self, profile: &mut AgentProfile) {
        if let Some(host) = &self.host {
            profile.address = host.clone();
        }
        if let Some(port) = self.port {
            profile.port = port;
        }
        if let Some(version) = self.snmp_version {
            profile.version = version.into();
        }
        if let Some(community) = &self.community {
            profile.read_community = community.clone();
        }
        if let Some(community) = &self.write_community {
            profile.write_community = community.clone();
        }
        if let Some(timeout) = self.timeout {
            profile.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            profile.retries = retries;
        }

        let v3 = &self.v3;
        if let Some(username) = &v3.username {
            profile.version = Version::V3;
            profile.usm.security_name = username.clone();
        }
        if let (Some(protocol), Some(pass)) = (v3.auth_protocol, &v3.auth_password) {
            profile.usm = std::mem::take(&mut profile.usm).with_auth(protocol, pass.clone());
        }
        if let (Some(protocol), Some(pass)) = (v3.priv_protocol, &v3.priv_password) {
            profile.usm = std::mem::take(&mut profile.usm).with_privacy(protocol, pass.clone());
        }
        if let Some(level) = v3.level {
            profile.usm.security_level = level;
        }
        if let Some(context) = &v3.context {
            profile.usm.context_name = context.clone();
        }
    }

    /// Retry policy requested with `--backoff`, if any.
    ///
    /// Without `--backoff` each target keeps its profile's immediate retries.
    pub fn retry(&self, profile: &AgentProfile) -> Option<Retry> {
        let backoff = match self.backoff? {
            BackoffStrategy::None => Backoff::None,
            BackoffStrategy::Fixed => Backoff::Fixed {
                delay: Duration::from_millis(self.backoff_delay),
            },
            BackoffStrategy::Exponential => Backoff::Exponential {
                initial: Duration::from_millis(self.backoff_delay),
                max: Duration::from_millis(self.backoff_max),
                jitter: self.backoff_jitter.clamp(0.0, 1.0),
            },
        };
        Some(Retry {
            max_attempts: profile.retries,
            backoff,
        })
    }
}

/// Output control arguments.
#[derive(Debug, Default, Args)]
pub struct OutputArgs {
    /// Enable debug logging (snmp_poller=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Enable trace logging (snmp_poller=trace).
    #[arg(short = 'D', long = "trace", global = true)]
    pub trace: bool,
}

impl OutputArgs {
    /// Initialize tracing based on debug/trace flags.
    ///
    /// `RUST_LOG` takes precedence when set.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_poller=trace"
        } else if self.debug {
            "snmp_poller=debug"
        } else {
            "snmp_poller=warn"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
            .with_writer(std::io::stderr)
            .try_init();
    }
}
