//! Scripted transport for tests.
//!
//! Replies are queued up front and handed out in order, one per `recv`.
//! Queued replies get their request id rewritten to the id being waited
//! on, so tests can build them with any placeholder id. Authenticated v3
//! replies are left alone since rewriting would break their HMAC.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, Result};
use crate::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, V3Message, peek_request_id,
};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::profile::SecurityLevel;
use crate::v3::UsmSecurityParams;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// One scripted outcome for a `recv`.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Reply with this message, request id patched to match.
    Data(Bytes),
    /// Reply with this message verbatim.
    RawData(Bytes),
    Timeout,
    IoError(String),
}

/// A message sent through the mock.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub target: SocketAddr,
    pub data: Bytes,
    pub request_id: Option<i32>,
}

impl RecordedRequest {
    /// Decode the recorded message.
    pub fn message(&self) -> Result<CommunityMessage> {
        CommunityMessage::decode(self.data.clone())
    }

    /// Decode the recorded message as SNMPv3.
    pub fn v3_message(&self) -> Result<V3Message> {
        V3Message::decode(self.data.clone())
    }
}

#[derive(Default)]
struct State {
    responses: VecDeque<MockResponse>,
    default_response: Option<MockResponse>,
    requests: Vec<RecordedRequest>,
    timeouts: std::collections::HashMap<i32, Duration>,
    next_request_id: i32,
}

/// Transport that answers from a queue instead of the network.
///
/// ```rust
/// use snmp_poller::transport::{MockTransport, ResponseBuilder};
/// use snmp_poller::{Value, oid};
///
/// let mock = MockTransport::new();
/// mock.queue_response(
///     ResponseBuilder::new()
///         .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(4200))
///         .build_v2c(b"public"),
/// );
/// mock.queue_timeout();
/// assert_eq!(mock.queued_response_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn queue_response(&self, data: impl Into<Bytes>) {
        self.state().responses.push_back(MockResponse::Data(data.into()));
    }

    /// Queue a reply that keeps its own request id.
    pub fn queue_raw_response(&self, data: impl Into<Bytes>) {
        self.state().responses.push_back(MockResponse::RawData(data.into()));
    }

    pub fn queue_timeout(&self) {
        self.state().responses.push_back(MockResponse::Timeout);
    }

    pub fn queue_io_error(&self, msg: impl Into<String>) {
        self.state().responses.push_back(MockResponse::IoError(msg.into()));
    }

    /// Outcome used once the queue is empty. Without one, `recv` times out.
    pub fn set_default_response(&self, response: MockResponse) {
        self.state().default_response = Some(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    pub fn queued_response_count(&self) -> usize {
        self.state().responses.len()
    }
}

fn patch_request_id(data: Bytes, request_id: i32) -> Bytes {
    if let Ok(mut msg) = CommunityMessage::decode(data.clone()) {
        msg.pdu.request_id = request_id;
        return msg.encode();
    }
    match V3Message::decode(data.clone()) {
        Ok(mut msg) if !msg.flags().security_level.requires_auth() => {
            msg.global_data.msg_id = request_id;
            if let ScopedPduData::Plaintext(scoped) = &mut msg.data {
                scoped.pdu.request_id = request_id;
            }
            msg.encode()
        }
        _ => data,
    }
}

impl Transport for MockTransport {
    fn register_request(&self, request_id: i32, timeout: Duration) {
        self.state().timeouts.insert(request_id, timeout);
    }

    fn cancel_request(&self, request_id: i32) {
        self.state().timeouts.remove(&request_id);
    }

    async fn send(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        let data = Bytes::copy_from_slice(data);
        let request_id = peek_request_id(&data);
        self.state().requests.push(RecordedRequest {
            target,
            data,
            request_id,
        });
        Ok(())
    }

    async fn recv(&self, request_id: i32, target: SocketAddr) -> Result<(Bytes, SocketAddr)> {
        let (response, timeout) = {
            let mut state = self.state();
            let response = state
                .responses
                .pop_front()
                .or_else(|| state.default_response.clone());
            let timeout = state.timeouts.remove(&request_id).unwrap_or_default();
            (response, timeout)
        };

        match response {
            Some(MockResponse::Data(data)) => Ok((patch_request_id(data, request_id), target)),
            Some(MockResponse::RawData(data)) => Ok((data, target)),
            Some(MockResponse::IoError(msg)) => Err(Error::Network {
                target,
                source: std::io::Error::other(msg),
            }
            .boxed()),
            Some(MockResponse::Timeout) | None => Err(Error::Timeout {
                target,
                elapsed: timeout,
                retries: 0,
            }
            .boxed()),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn alloc_request_id(&self) -> i32 {
        let mut state = self.state();
        state.next_request_id += 1;
        state.next_request_id
    }
}

/// Builds encoded response messages for [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    request_id: i32,
    varbinds: Vec<VarBind>,
    error_status: i32,
    error_index: i32,
    report: bool,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request id for raw (unpatched) replies.
    pub fn request_id(mut self, request_id: i32) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn varbind(mut self, oid: Oid, value: Value) -> Self {
        self.varbinds.push(VarBind::new(oid, value));
        self
    }

    pub fn error_status(mut self, status: crate::error::ErrorStatus) -> Self {
        self.error_status = status.as_i32();
        self
    }

    pub fn error_index(mut self, index: i32) -> Self {
        self.error_index = index;
        self
    }

    /// Send a Report PDU instead of a Response.
    pub fn report(mut self) -> Self {
        self.report = true;
        self
    }

    pub fn into_pdu(self) -> Pdu {
        Pdu {
            pdu_type: if self.report { PduType::Report } else { PduType::Response },
            request_id: self.request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            varbinds: self.varbinds,
        }
    }

    pub fn build(self, version: Version, community: &[u8]) -> Bytes {
        let pdu = self.into_pdu();
        CommunityMessage {
            version,
            community: Bytes::copy_from_slice(community),
            pdu,
        }
        .encode()
    }

    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        self.build(Version::V2c, community)
    }

    pub fn build_v1(self, community: &[u8]) -> Bytes {
        self.build(Version::V1, community)
    }

    /// noAuthNoPriv v3 reply from the engine `engine_id`.
    pub fn build_v3(self, engine_id: &[u8], engine_boots: u32, engine_time: u32) -> Bytes {
        let msg_id = self.request_id;
        let engine_id = Bytes::copy_from_slice(engine_id);
        V3Message {
            global_data: MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, false)),
            security_params: UsmSecurityParams::new(engine_id.clone(), engine_boots, engine_time, Bytes::new())
                .encode(),
            data: ScopedPduData::Plaintext(ScopedPdu::new(engine_id, Bytes::new(), self.into_pdu())),
        }
        .encode()
    }
}
