//! # snmp-poller
//!
//! Asynchronous SNMP agent requests and periodic sampling for live graphs.
//!
//! ## Features
//!
//! - Get, GetNext, Set, subtree walk and table view against one selected
//!   agent profile, with results pushed to a [`Reporter`]
//! - A request core that tolerates late and stray replies: every new
//!   operation supersedes the one in flight
//! - A synchronous-style numeric fetch ([`SyncFetcher`]) used by the
//!   sampling feed
//! - Named graphs of up to eight curves, each sampling one OID per tick
//!   into a bounded history
//! - Agent profiles persisted as JSON ([`ProfileStore`])
//! - SNMPv3 with the User-based Security Model: engine discovery, MD5/SHA
//!   authentication and DES/AES privacy ([`v3`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_poller::agent::{AgentRunner, ChannelReporter, Report};
//! use snmp_poller::{AgentProfile, Session, Target, Version};
//!
//! #[tokio::main]
//! async fn main() -> snmp_poller::Result<()> {
//!     let profile = AgentProfile::community("router", "192.0.2.1", Version::V2c, "public");
//!     let target = Target::from_profile(profile.version, &profile, false)?;
//!     let session = Session::udp_for(&target).await?;
//!
//!     let (reporter, mut reports) = ChannelReporter::new();
//!     let (runner, agent) = AgentRunner::new(session, profile, reporter);
//!     tokio::spawn(runner.run());
//!
//!     agent.get_from("1.3.6.1.2.1.1.1.0");
//!     if let Some(Report::Value { oid, formatted }) = reports.recv().await {
//!         println!("{oid} = {formatted}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Sampling
//!
//! ```rust,no_run
//! use snmp_poller::sampling::SamplingFeed;
//! use snmp_poller::{AgentProfile, SyncFetcher, Version};
//!
//! #[tokio::main]
//! async fn main() -> snmp_poller::Result<()> {
//!     let profile = AgentProfile::community("router", "192.0.2.1", Version::V2c, "public");
//!     let mut feed = SamplingFeed::new(SyncFetcher::from_profile(&profile).await?);
//!
//!     feed.create_graph("traffic")?;
//!     feed.add_curve("traffic", "ifInOctets.1", "1.3.6.1.2.1.2.2.1.10.1")?;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     println!("{:?}", feed.snapshot("traffic"));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod ber;
pub mod error;
pub mod format;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod profile;
pub mod sampling;
pub mod session;
pub mod target;
pub mod transport;
pub mod value;
pub mod v3;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use agent::{
    AgentCore, AgentHandle, AgentRunner, ChannelReporter, Report, Reporter, SyncFetcher,
    ValueSource,
};
pub use error::{AuthErrorKind, DecodeErrorKind, Error, ErrorStatus, GraphErrorKind, Result};
pub use message::{CommunityMessage, V3Message};
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use profile::{AgentProfile, AuthProtocol, PrivProtocol, ProfileStore, SecurityLevel, UsmProfile};
pub use session::{Backoff, Retry, Session};
pub use target::{Operation, Security, Target, configure_pdu};
pub use transport::{Transport, UdpTransport};
pub use value::{Value, ValueSyntax};
pub use varbind::VarBind;
pub use version::Version;
