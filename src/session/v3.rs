//! SNMPv3 requests: engine discovery, then USM-secured exchanges.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use tracing::Span;

use super::{Session, check_response};
use crate::error::{AuthErrorKind, DecodeErrorKind, Error, ErrorStatus, Result};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, V3Message};
use crate::pdu::{Pdu, PduType};
use crate::profile::UsmProfile;
use crate::target::Target;
use crate::transport::Transport;
use crate::v3::{self, EngineCache, EngineState, SaltCounter, UsmKeys, UsmSecurityParams};

/// USM state shared by the clones of one session.
#[derive(Debug, Default)]
pub(crate) struct UsmState {
    engines: EngineCache,
    keys: Mutex<HashMap<SocketAddr, CachedKeys>>,
    salt: SaltCounter,
}

#[derive(Debug)]
struct CachedKeys {
    engine_id: Bytes,
    usm: UsmProfile,
    keys: Arc<UsmKeys>,
}

impl UsmState {
    pub(crate) fn engines(&self) -> &EngineCache {
        &self.engines
    }

    /// Localized keys for `usm` at `engine_id`, derived once per change.
    fn keys_for(&self, addr: SocketAddr, usm: &UsmProfile, engine_id: &Bytes) -> Arc<UsmKeys> {
        let mut cache = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(&addr)
            && cached.engine_id == *engine_id
            && cached.usm == *usm
        {
            return cached.keys.clone();
        }
        let keys = Arc::new(UsmKeys::derive(usm, engine_id));
        cache.insert(
            addr,
            CachedKeys {
                engine_id: engine_id.clone(),
                usm: usm.clone(),
                keys: keys.clone(),
            },
        );
        keys
    }
}

/// What a v3 reply asks of the request loop.
enum V3Reply {
    Response(Pdu),
    /// The agent refused our clock; resend with the corrected one.
    Resync,
}

impl<T: Transport> Session<T> {
    pub(super) async fn request_v3(&self, target: &Target, usm: &UsmProfile, mut pdu: Pdu) -> Result<Pdu> {
        let engine = self.discover(target).await?;
        let keys = self.usm.keys_for(target.addr, usm, &engine.engine_id);

        let request_id = self.transport.alloc_request_id();
        Span::current().record("snmp.request_id", request_id);
        pdu.request_id = request_id;
        let scoped = ScopedPdu::new(
            engine.engine_id.clone(),
            Bytes::from(usm.context_name.clone().into_bytes()),
            pdu,
        );
        let global_data = MsgGlobalData::new(request_id, MsgFlags::new(keys.security_level(), true));

        let start = Instant::now();
        let max_attempts = target.retry.max_attempts;
        let mut attempt = 0;
        let mut resynced = false;
        loop {
            Span::current().record("snmp.attempt", attempt);
            let engine = self.usm.engines.get(&target.addr).unwrap_or_else(|| engine.clone());
            let header = UsmSecurityParams::new(
                engine.engine_id.clone(),
                engine.engine_boots,
                engine.estimated_time(),
                Bytes::from(usm.security_name.clone().into_bytes()),
            );
            let data = v3::seal(target.addr, global_data, header, &scoped, &keys, &self.usm.salt)?;

            let mut out_of_window = false;
            if let Some(reply) = self.send_once(target, request_id, &data).await? {
                match self.open_reply(target, &keys, request_id, reply)? {
                    V3Reply::Response(pdu) => {
                        Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                        return check_response(target, request_id, pdu);
                    }
                    V3Reply::Resync if !resynced => {
                        // one immediate resend after a clock correction
                        resynced = true;
                        continue;
                    }
                    V3Reply::Resync => out_of_window = true,
                }
            }

            if attempt >= max_attempts {
                if out_of_window {
                    return Err(Error::auth(target.addr, AuthErrorKind::NotInTimeWindow));
                }
                return Err(self.timed_out(target, request_id, start));
            }
            self.backoff(target, attempt).await;
            attempt += 1;
        }
    }

    /// Learn the agent's engine id and clock, once per address.
    async fn discover(&self, target: &Target) -> Result<EngineState> {
        if let Some(engine) = self.usm.engines.get(&target.addr) {
            return Ok(engine);
        }

        let msg_id = self.transport.alloc_request_id();
        let data = V3Message::discovery_request(msg_id).encode();
        let start = Instant::now();
        let max_attempts = target.retry.max_attempts;

        for attempt in 0..=max_attempts {
            if let Some(reply) = self.send_once(target, msg_id, &data).await? {
                let message = V3Message::decode_from_peer(reply, target.addr)?;
                check_msg_id(target, msg_id, &message)?;
                let params = message.usm_params(target.addr)?;
                if params.engine_id.is_empty() {
                    return Err(Error::malformed(target.addr, DecodeErrorKind::EmptyEngineId));
                }
                let engine = EngineState::new(params.engine_id, params.engine_boots, params.engine_time);
                tracing::debug!(target: "snmp_poller::session", { snmp.target = %target.addr, snmp.engine_boots = engine.engine_boots, snmp.engine_time = engine.engine_time }, "discovered engine");
                self.usm.engines.insert(target.addr, engine.clone());
                return Ok(engine);
            }
            if attempt < max_attempts {
                self.backoff(target, attempt).await;
            }
        }
        Err(self.timed_out(target, msg_id, start))
    }

    fn open_reply(&self, target: &Target, keys: &UsmKeys, request_id: i32, reply: Bytes) -> Result<V3Reply> {
        let message = V3Message::decode_from_peer(reply.clone(), target.addr)?;
        check_msg_id(target, request_id, &message)?;
        let params = message.usm_params(target.addr)?;
        let level = message.flags().security_level;
        let scoped = v3::unseal(target.addr, &reply, message, &params, keys)?;

        if scoped.pdu.pdu_type == PduType::Report {
            return self.on_report(target, &params, level.requires_auth(), scoped.pdu);
        }

        let expected = keys.security_level();
        if expected.requires_auth() && !level.requires_auth() {
            return Err(Error::auth(target.addr, AuthErrorKind::MissingAuthentication));
        }
        if expected.requires_privacy() && !level.requires_privacy() {
            return Err(Error::malformed(target.addr, DecodeErrorKind::ExpectedEncryption));
        }
        if level.requires_auth() {
            self.usm
                .engines
                .update_time(&target.addr, params.engine_boots, params.engine_time);
        }
        Ok(V3Reply::Response(scoped.pdu))
    }

    fn on_report(
        &self,
        target: &Target,
        params: &UsmSecurityParams,
        authenticated: bool,
        pdu: Pdu,
    ) -> Result<V3Reply> {
        let kind = v3::report_kind(&pdu);
        tracing::debug!(target: "snmp_poller::session", { snmp.target = %target.addr, ?kind, authenticated }, "received report");
        match kind {
            Some(AuthErrorKind::NotInTimeWindow) => {
                if authenticated {
                    self.usm
                        .engines
                        .update_time(&target.addr, params.engine_boots, params.engine_time);
                }
                Ok(V3Reply::Resync)
            }
            Some(AuthErrorKind::UnknownEngineId) => {
                self.usm.engines.remove(&target.addr);
                Err(Error::auth(target.addr, AuthErrorKind::UnknownEngineId))
            }
            Some(kind) => Err(Error::auth(target.addr, kind)),
            None => Err(Error::Snmp {
                target: target.addr,
                status: ErrorStatus::GenErr,
                index: 0,
                oid: pdu.varbinds.first().map(|vb| vb.oid.clone()),
            }
            .boxed()),
        }
    }
}

fn check_msg_id(target: &Target, expected: i32, message: &V3Message) -> Result<()> {
    if message.msg_id() != expected {
        tracing::warn!(target: "snmp_poller::session", { snmp.target = %target.addr, expected, actual = message.msg_id() }, "msgID mismatch in response");
        return Err(Error::malformed(
            target.addr,
            DecodeErrorKind::RequestIdMismatch {
                expected,
                actual: message.msg_id(),
            },
        ));
    }
    Ok(())
}
