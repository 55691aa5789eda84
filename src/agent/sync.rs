//! Scalar fetches for the sampling feed.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::profile::AgentProfile;
use crate::session::Session;
use crate::target::Target;
use crate::transport::{Transport, UdpTransport};

/// Something that can produce one numeric reading per OID.
///
/// `None` means the reading failed; the sampler records a gap.
pub trait ValueSource: Send + Sync + 'static {
    fn sample(&self, oid: &Oid) -> impl Future<Output = Option<u64>> + Send;
}

impl<S: ValueSource> ValueSource for Arc<S> {
    fn sample(&self, oid: &Oid) -> impl Future<Output = Option<u64>> + Send {
        (**self).sample(oid)
    }
}

/// Fetches single values with its own target and transport.
///
/// Independent of any [`AgentCore`](super::AgentCore) operation in flight:
/// it never shares a request id or a pending slot with interactive
/// requests.
///
/// ```rust,no_run
/// # async fn example() -> snmp_poller::Result<()> {
/// use snmp_poller::{AgentProfile, SyncFetcher, Version};
///
/// let profile = AgentProfile::community("lab", "192.0.2.1", Version::V2c, "public");
/// let fetcher = SyncFetcher::from_profile(&profile).await?;
/// let uptime = fetcher.get_sync_value("1.3.6.1.2.1.1.3.0").await;
/// println!("sysUpTime = {uptime}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SyncFetcher<T: Transport = UdpTransport> {
    session: Session<T>,
    target: Target,
}

impl SyncFetcher<UdpTransport> {
    /// Build a fetcher on a fresh UDP transport for `profile`.
    pub async fn from_profile(profile: &AgentProfile) -> Result<Self> {
        let target = Target::from_profile(profile.version, profile, false)?;
        let session = Session::udp_for(&target).await?;
        Ok(Self::new(session, target))
    }
}

impl<T: Transport> SyncFetcher<T> {
    pub fn new(session: Session<T>, target: Target) -> Self {
        Self { session, target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Fetch `oid` as an unsigned number.
    ///
    /// Counters, gauges, timeticks and non-negative integers convert; any
    /// transport error, SNMP error, exception or non-numeric type gives
    /// `None`.
    pub async fn try_value(&self, oid: &Oid) -> Option<u64> {
        let pdu = Pdu::get_request(std::slice::from_ref(oid));
        match self.session.request(&self.target, pdu).await {
            Ok(reply) => {
                let value = reply.varbinds.into_iter().next()?.value;
                let reading = value.as_u64();
                if reading.is_none() {
                    tracing::debug!(target: "snmp_poller::sampling", { snmp.oid = %oid, value = %value }, "value is not numeric");
                }
                reading
            }
            Err(e) => {
                tracing::debug!(target: "snmp_poller::sampling", { snmp.oid = %oid, error = %e }, "sample fetch failed");
                None
            }
        }
    }

    /// Fetch `oid` (dotted text), returning 0 on any failure.
    ///
    /// A real zero reading and a failure look the same here; use
    /// [`try_value`](Self::try_value) to tell them apart.
    pub async fn get_sync_value(&self, oid: &str) -> u64 {
        match Oid::parse(oid) {
            Ok(oid) => self.try_value(&oid).await.unwrap_or(0),
            Err(e) => {
                tracing::debug!(target: "snmp_poller::sampling", error = %e, "bad sample OID");
                0
            }
        }
    }
}

impl<T: Transport> ValueSource for SyncFetcher<T> {
    fn sample(&self, oid: &Oid) -> impl Future<Output = Option<u64>> + Send {
        self.try_value(oid)
    }
}
