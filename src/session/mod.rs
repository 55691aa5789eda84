//! One request, one reply: framing, retries and reply validation on top of
//! a [`Transport`].

mod retry;
mod v3;

pub use retry::{Backoff, Retry};

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{Span, instrument};

use crate::error::{DecodeErrorKind, Error, Result};
use crate::message::CommunityMessage;
use crate::pdu::{Pdu, PduType};
use crate::target::{Security, Target};
use crate::transport::{Transport, UdpTransport};
use crate::version::Version;

/// Sends request PDUs to targets over a shared transport.
///
/// Cloning a session is cheap and the clones share the transport, so many
/// requests may be in flight at once; each is correlated by its own
/// request id. SNMPv3 engine state and localized keys are shared the same
/// way, so an agent is discovered once per session.
///
/// ```rust,no_run
/// # async fn example() -> snmp_poller::Result<()> {
/// use snmp_poller::{AgentProfile, Operation, Session, Target, Version, configure_pdu};
///
/// let profile = AgentProfile::community("lab", "192.0.2.1", Version::V2c, "public");
/// let target = Target::from_profile(Version::V2c, &profile, false)?;
/// let (pdu, _) = configure_pdu(&Operation::Get, "1.3.6.1.2.1.1.5.0")?;
///
/// let session = Session::udp_for(&target).await?;
/// let reply = session.request(&target, pdu).await?;
/// println!("{}", reply.varbinds[0]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Session<T: Transport = UdpTransport> {
    transport: T,
    usm: Arc<v3::UsmState>,
}

impl Session<UdpTransport> {
    /// Session over a fresh UDP transport suited to `target`'s address family.
    pub async fn udp_for(target: &Target) -> Result<Self> {
        Ok(Self::new(UdpTransport::for_target(target.addr).await?))
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            usm: Arc::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Engines discovered by v3 requests, keyed by agent address.
    pub fn engines(&self) -> &crate::v3::EngineCache {
        self.usm.engines()
    }

    /// Send `pdu` to `target` and return the validated reply.
    ///
    /// Timeouts are retried per `target.retry`. A reply with a non-zero
    /// error-status becomes [`Error::Snmp`]; one whose version, PDU type or
    /// request id does not match the request becomes
    /// [`Error::MalformedResponse`].
    ///
    /// v3 targets first discover the agent's engine, then send the request
    /// signed and encrypted as their [`UsmProfile`](crate::UsmProfile)
    /// asks. usmStats reports become [`Error::Auth`]; a notInTimeWindow
    /// report resynchronizes the clock and resends.
    #[instrument(
        level = "debug",
        skip(self, target, pdu),
        err,
        fields(
            snmp.target = %target.addr,
            snmp.pdu_type = %pdu.pdu_type,
            snmp.request_id = tracing::field::Empty,
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    pub async fn request(&self, target: &Target, mut pdu: Pdu) -> Result<Pdu> {
        let community = match &target.security {
            Security::Community(community) if target.version.is_community() => community.clone(),
            Security::Usm(usm) if target.version == Version::V3 => {
                return self.request_v3(target, usm, pdu).await;
            }
            _ => {
                return Err(Error::Unsupported(
                    format!("{} cannot be sent with this security", target.version).into(),
                )
                .boxed());
            }
        };

        let request_id = self.transport.alloc_request_id();
        Span::current().record("snmp.request_id", request_id);
        pdu.request_id = request_id;
        let data = CommunityMessage::new(target.version, community, pdu)?.encode();

        let start = Instant::now();
        let result = self.send_and_recv(target, request_id, &data).await;
        Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);

        let reply = result?;
        validate_reply(target, request_id, reply)
    }

    async fn send_and_recv(&self, target: &Target, request_id: i32, data: &Bytes) -> Result<CommunityMessage> {
        let start = Instant::now();
        let max_attempts = target.retry.max_attempts;

        for attempt in 0..=max_attempts {
            Span::current().record("snmp.attempt", attempt);
            if attempt > 0 {
                tracing::debug!(target: "snmp_poller::session", { snmp.request_id = request_id }, "retrying request");
            }
            if let Some(reply) = self.send_once(target, request_id, data).await? {
                return CommunityMessage::decode_from_peer(reply, target.addr);
            }
            if attempt < max_attempts {
                self.backoff(target, attempt).await;
            }
        }

        Err(self.timed_out(target, request_id, start))
    }

    /// One send and wait. `None` means the wait timed out.
    async fn send_once(&self, target: &Target, request_id: i32, data: &[u8]) -> Result<Option<Bytes>> {
        self.transport.register_request(request_id, target.timeout);
        if let Err(e) = self.transport.send(target.addr, data).await {
            self.transport.cancel_request(request_id);
            return Err(e);
        }

        match self.transport.recv(request_id, target.addr).await {
            Ok((reply, source)) => {
                if source != target.addr {
                    tracing::debug!(target: "snmp_poller::session", { snmp.target = %target.addr, snmp.source = %source }, "reply from unexpected address");
                }
                Ok(Some(reply))
            }
            Err(e) if matches!(*e, Error::Timeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn backoff(&self, target: &Target, attempt: u32) {
        let delay = target.retry.compute_delay(attempt);
        if !delay.is_zero() {
            tracing::debug!(target: "snmp_poller::session", { delay_ms = delay.as_millis() as u64 }, "backing off");
            tokio::time::sleep(delay).await;
        }
    }

    fn timed_out(&self, target: &Target, request_id: i32, start: Instant) -> Box<Error> {
        let elapsed = start.elapsed();
        let retries = target.retry.max_attempts;
        tracing::debug!(target: "snmp_poller::session", { snmp.request_id = request_id, snmp.target = %target.addr, ?elapsed, retries }, "request timed out");
        Error::Timeout {
            target: target.addr,
            elapsed,
            retries,
        }
        .boxed()
    }
}

fn validate_reply(target: &Target, request_id: i32, reply: CommunityMessage) -> Result<Pdu> {
    if reply.version != target.version {
        tracing::warn!(target: "snmp_poller::session", { snmp.target = %target.addr, expected = %target.version, actual = %reply.version }, "version mismatch in response");
        return Err(Error::malformed(target.addr, DecodeErrorKind::VersionMismatch));
    }
    check_response(target, request_id, reply.pdu)
}

/// Type, request id and error-status checks shared by every version.
fn check_response(target: &Target, request_id: i32, pdu: Pdu) -> Result<Pdu> {
    if pdu.pdu_type != PduType::Response {
        tracing::warn!(target: "snmp_poller::session", { snmp.target = %target.addr, snmp.pdu_type = %pdu.pdu_type }, "reply is not a Response PDU");
        return Err(Error::malformed(
            target.addr,
            DecodeErrorKind::UnexpectedPduType(pdu.pdu_type.tag()),
        ));
    }
    if pdu.request_id != request_id {
        tracing::warn!(target: "snmp_poller::session", { snmp.target = %target.addr, expected = request_id, actual = pdu.request_id }, "request ID mismatch in response");
        return Err(Error::malformed(
            target.addr,
            DecodeErrorKind::RequestIdMismatch {
                expected: request_id,
                actual: pdu.request_id,
            },
        ));
    }
    if pdu.is_error() {
        return Err(Error::Snmp {
            target: target.addr,
            status: pdu.error_status_enum(),
            index: pdu.error_index.max(0) as u32,
            oid: pdu.error_oid(),
        }
        .boxed());
    }

    tracing::debug!(target: "snmp_poller::session", { snmp.target = %target.addr, snmp.varbind_count = pdu.varbinds.len() }, "received response");
    Ok(pdu)
}
