//! In-process SNMP agent for testing.
//!
//! Answers v1/v2c and USM-secured v3 Get, GetNext and Set from a BTreeMap.
//! Agents bind to ephemeral localhost ports and shut down cleanly on drop.

use crate::common::fixtures::{self, COMMUNITY_RO, COMMUNITY_RW, ENGINE_ID};

use bytes::Bytes;
use snmp_poller::message::{MsgFlags, MsgGlobalData, ScopedPdu, V3Message};
use snmp_poller::v3::{self, SaltCounter, TIME_WINDOW, UsmKeys, UsmSecurityParams, report_oids};
use snmp_poller::{
    AuthErrorKind, CommunityMessage, Error, ErrorStatus, Oid, Pdu, PduType, SecurityLevel, UsmProfile,
    Value, VarBind, Version,
};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// An in-process SNMP agent for testing.
///
/// Automatically starts on creation and stops on drop. Reads accept either
/// community; Set requires the write community. Requests with an unknown
/// community are dropped without a reply, as real agents do.
///
/// v3 requests are checked against the users given to [`TestAgent::v3`]
/// and refused with the usmStats report a real agent would send. Any
/// authenticated v3 user may Set.
///
/// # Example
///
/// ```ignore
/// let agent = TestAgent::new().await;
/// let profile = common::profile_for(agent.addr(), Version::V2c);
/// let (handle, mut reports) = common::spawn_runner(profile).await;
/// handle.get_from("1.3.6.1.2.1.1.1.0");
/// ```
pub struct TestAgent {
    addr: SocketAddr,
    state: Arc<AgentState>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

struct AgentState {
    data: Mutex<BTreeMap<Oid, Value>>,
    requests: AtomicU32,
    drop_next: AtomicU32,
    engine: Mutex<Engine>,
    /// Keys localized to [`ENGINE_ID`], by user name.
    users: HashMap<Bytes, UsmKeys>,
    salt: SaltCounter,
}

struct Engine {
    boots: u32,
    time_base: u32,
    started: Instant,
}

impl Engine {
    fn time(&self) -> u32 {
        self.time_base + self.started.elapsed().as_secs() as u32
    }
}

impl TestAgent {
    /// Create an agent with default system MIB data.
    pub async fn new() -> Self {
        Self::with_data(fixtures::system_mib()).await
    }

    /// Create an agent with custom initial data.
    pub async fn with_data(initial: BTreeMap<Oid, Value>) -> Self {
        Self::start(initial, &[]).await
    }

    /// Create an agent with default system MIB data that also accepts v3
    /// requests from `users`.
    pub async fn v3(users: &[UsmProfile]) -> Self {
        Self::start(fixtures::system_mib(), users).await
    }

    async fn start(initial: BTreeMap<Oid, Value>, users: &[UsmProfile]) -> Self {
        let users = users
            .iter()
            .map(|usm| {
                let name = Bytes::from(usm.security_name.clone());
                (name, UsmKeys::derive(usm, ENGINE_ID))
            })
            .collect();
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test agent");
        let addr = socket.local_addr().expect("test agent address");

        let state = Arc::new(AgentState {
            data: Mutex::new(initial),
            requests: AtomicU32::new(0),
            drop_next: AtomicU32::new(0),
            engine: Mutex::new(Engine {
                boots: 1,
                time_base: 1000,
                started: Instant::now(),
            }),
            users,
            salt: SaltCounter::new(),
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(serve(socket, state.clone(), cancel.clone()));

        Self {
            addr,
            state,
            cancel,
            _task: task,
        }
    }

    /// Get the agent's listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Insert or update a value in the MIB.
    pub fn set(&self, oid: Oid, value: Value) {
        self.state.data.lock().unwrap().insert(oid, value);
    }

    /// Get a value from the MIB (cloned).
    pub fn get(&self, oid: &Oid) -> Option<Value> {
        self.state.data.lock().unwrap().get(oid).cloned()
    }

    /// Datagrams received so far, answered or not.
    pub fn request_count(&self) -> u32 {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Restart the SNMP engine: snmpEngineBoots goes up and the engine
    /// clock starts over, so managers must resynchronize.
    pub fn reboot(&self) {
        let mut engine = self.state.engine.lock().unwrap();
        engine.boots += 1;
        engine.time_base = 0;
        engine.started = Instant::now();
    }

    pub fn engine_boots(&self) -> u32 {
        self.state.engine.lock().unwrap().boots
    }

    /// Silently drop the next `n` requests.
    pub fn drop_next(&self, n: u32) {
        self.state.drop_next.store(n, Ordering::SeqCst);
    }

    /// Explicitly stop the agent.
    ///
    /// Called automatically on drop, but can be called early if needed.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn serve(socket: UdpSocket, state: Arc<AgentState>, cancel: CancellationToken) {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => return,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    eprintln!("TestAgent error: {}", e);
                    continue;
                }
            },
        };

        state.requests.fetch_add(1, Ordering::SeqCst);
        let dropped = state
            .drop_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if dropped {
            continue;
        }

        let datagram = Bytes::copy_from_slice(&buf[..len]);
        let reply = match CommunityMessage::decode(datagram.clone()) {
            Ok(request) => state.respond(&request).map(|reply| reply.encode()),
            Err(_) => state.respond_v3(peer, &datagram),
        };
        if let Some(reply) = reply {
            let _ = socket.send_to(&reply, peer).await;
        }
    }
}

impl AgentState {
    fn respond(&self, request: &CommunityMessage) -> Option<CommunityMessage> {
        let community = request.community.as_ref();
        let writable = community == COMMUNITY_RW.as_bytes();
        if !writable && community != COMMUNITY_RO.as_bytes() {
            return None;
        }

        let v1 = request.version == Version::V1;
        let reply = self.answer(&request.pdu, v1, writable)?;
        CommunityMessage::new(request.version, request.community.clone(), reply).ok()
    }

    /// Process a v3 request the way RFC 3414 §3.2 orders the checks.
    fn respond_v3(&self, peer: SocketAddr, datagram: &Bytes) -> Option<Bytes> {
        let request = V3Message::decode_from_peer(datagram.clone(), peer).ok()?;
        let params = request.usm_params(peer).ok()?;
        let msg_id = request.msg_id();
        let request_id = request.scoped_pdu().map_or(0, |scoped| scoped.pdu.request_id);
        let none = UsmKeys::none();
        let refuse = |counter: Oid, keys: &UsmKeys, request_id: i32| {
            self.report(peer, msg_id, request_id, &params, counter, keys)
        };

        if params.engine_id.as_ref() != ENGINE_ID {
            return refuse(report_oids::unknown_engine_ids(), &none, request_id);
        }
        let Some(keys) = self.users.get(&params.username) else {
            return refuse(report_oids::unknown_user_names(), &none, request_id);
        };
        if request.flags().security_level != keys.security_level() {
            return refuse(report_oids::unsupported_sec_levels(), &none, request_id);
        }

        let authenticated = keys.security_level().requires_auth();
        // reports to an authenticated user are signed but never encrypted
        let report_keys = UsmKeys {
            auth: keys.auth.clone(),
            privacy: None,
        };
        let scoped = match v3::unseal(peer, datagram, request, &params, keys) {
            Ok(scoped) => scoped,
            Err(e) => {
                let counter = match *e {
                    Error::Auth {
                        kind: AuthErrorKind::DecryptionFailed,
                        ..
                    } => report_oids::decryption_errors(),
                    _ => report_oids::wrong_digests(),
                };
                return refuse(counter, &none, request_id);
            }
        };

        let (boots, time) = {
            let engine = self.engine.lock().unwrap();
            (engine.boots, engine.time())
        };
        if authenticated
            && (params.engine_boots != boots || params.engine_time.abs_diff(time) > TIME_WINDOW)
        {
            return refuse(report_oids::not_in_time_windows(), &report_keys, scoped.pdu.request_id);
        }

        let reply = self.answer(&scoped.pdu, false, authenticated)?;
        let header = UsmSecurityParams::new(ENGINE_ID, boots, time, params.username.clone());
        let scoped = ScopedPdu::new(ENGINE_ID, scoped.context_name, reply);
        let global = MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, false));
        v3::seal(peer, global, header, &scoped, keys, &self.salt).ok()
    }

    fn report(
        &self,
        peer: SocketAddr,
        msg_id: i32,
        request_id: i32,
        params: &UsmSecurityParams,
        counter: Oid,
        keys: &UsmKeys,
    ) -> Option<Bytes> {
        let (boots, time) = {
            let engine = self.engine.lock().unwrap();
            (engine.boots, engine.time())
        };
        let pdu = Pdu {
            pdu_type: PduType::Report,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(counter, Value::Counter32(1))],
        };
        let header = UsmSecurityParams::new(ENGINE_ID, boots, time, params.username.clone());
        let scoped = ScopedPdu::new(ENGINE_ID, Bytes::new(), pdu);
        let global = MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, false));
        v3::seal(peer, global, header, &scoped, keys, &self.salt).ok()
    }

    fn answer(&self, pdu: &Pdu, v1: bool, writable: bool) -> Option<Pdu> {
        let mut data = self.data.lock().unwrap();

        let reply = match pdu.pdu_type {
            PduType::GetRequest => {
                let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
                let mut failed = None;
                for (i, vb) in pdu.varbinds.iter().enumerate() {
                    match data.get(&vb.oid) {
                        Some(value) => varbinds.push(VarBind::new(vb.oid.clone(), value.clone())),
                        None if v1 => {
                            failed = Some(i);
                            break;
                        }
                        None => varbinds.push(VarBind::new(vb.oid.clone(), Value::NoSuchObject)),
                    }
                }
                match failed {
                    Some(i) => pdu.to_error_response(ErrorStatus::NoSuchName, i as i32 + 1),
                    None => pdu.to_response(varbinds),
                }
            }
            PduType::GetNextRequest => {
                let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
                let mut failed = None;
                for (i, vb) in pdu.varbinds.iter().enumerate() {
                    let next = data
                        .range((Bound::Excluded(vb.oid.clone()), Bound::Unbounded))
                        .next();
                    match next {
                        Some((oid, value)) => varbinds.push(VarBind::new(oid.clone(), value.clone())),
                        None if v1 => {
                            failed = Some(i);
                            break;
                        }
                        None => varbinds.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
                    }
                }
                match failed {
                    Some(i) => pdu.to_error_response(ErrorStatus::NoSuchName, i as i32 + 1),
                    None => pdu.to_response(varbinds),
                }
            }
            PduType::SetRequest => {
                if !writable {
                    // v1 has no noAccess; RFC 2576 maps it to noSuchName
                    let status = if v1 {
                        ErrorStatus::NoSuchName
                    } else {
                        ErrorStatus::NoAccess
                    };
                    pdu.to_error_response(status, 1)
                } else if let Some(i) = pdu.varbinds.iter().position(|vb| !data.contains_key(&vb.oid)) {
                    let status = if v1 {
                        ErrorStatus::NoSuchName
                    } else {
                        ErrorStatus::NotWritable
                    };
                    pdu.to_error_response(status, i as i32 + 1)
                } else {
                    for vb in &pdu.varbinds {
                        data.insert(vb.oid.clone(), vb.value.clone());
                    }
                    pdu.to_response(pdu.varbinds.clone())
                }
            }
            PduType::Response | PduType::Report => return None,
        };

        Some(reply)
    }
}
