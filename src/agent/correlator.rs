//! The request correlator: one logical operation at a time.

use std::fmt::Write as _;

use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::profile::AgentProfile;
use crate::session::Retry;
use crate::target::{Operation, Target, configure_pdu};
use crate::value::{Value, ValueSyntax};
use crate::varbind::VarBind;
use crate::version::Version;

use super::reporter::Reporter;
use super::table::Table;

/// Which single-shot request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    GetNext,
    Set,
}

#[derive(Debug)]
enum State {
    Idle,
    Awaiting {
        kind: RequestKind,
    },
    Walking {
        root: Oid,
        last: Oid,
        target: Target,
    },
    TableView {
        root: Oid,
        last: Oid,
        target: Target,
        table: Table,
    },
}

/// Coarse view of the core's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Awaiting(RequestKind),
    Walking,
    TableView,
}

/// A request the core wants sent.
///
/// The reply must come back through
/// [`AgentCore::on_transport_reply`] with the same `token`.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub token: u64,
    pub target: Target,
    pub pdu: Pdu,
}

/// Why a walk step ended the walk.
enum WalkStep {
    Continue(VarBind),
    Finish,
}

/// State machine behind the interactive operations.
///
/// The core does no I/O. Each operation method returns the request to send
/// (or `None` when input was rejected and reported), and every completion
/// is fed back through [`on_transport_reply`](Self::on_transport_reply),
/// which returns the follow-up request of a walk, if any.
///
/// Starting an operation abandons whatever was in flight: its reply will
/// carry a stale token and be ignored.
pub struct AgentCore<R> {
    reporter: R,
    profile: AgentProfile,
    version_override: Option<Version>,
    retry_override: Option<Retry>,
    state: State,
    token: u64,
    objects: u32,
    requests: u32,
    message: String,
    stop_requested: bool,
}

impl<R: Reporter> AgentCore<R> {
    pub fn new(profile: AgentProfile, reporter: R) -> Self {
        Self {
            reporter,
            profile,
            version_override: None,
            retry_override: None,
            state: State::Idle,
            token: 0,
            objects: 0,
            requests: 0,
            message: String::new(),
            stop_requested: false,
        }
    }

    /// Use `profile` for subsequent operations.
    pub fn select_profile(&mut self, profile: AgentProfile) {
        tracing::debug!(target: "snmp_poller::agent", profile = %profile.name, "profile selected");
        self.profile = profile;
    }

    /// Force a version regardless of the profile's preference.
    pub fn prefer_version(&mut self, version: Option<Version>) {
        self.version_override = version;
    }

    /// Retry policy for every target instead of the profile's immediate
    /// retries.
    pub fn set_retry(&mut self, retry: Option<Retry>) {
        self.retry_override = retry;
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn version(&self) -> Version {
        self.version_override.unwrap_or(self.profile.version)
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            State::Idle => Phase::Idle,
            State::Awaiting { kind } => Phase::Awaiting(*kind),
            State::Walking { .. } => Phase::Walking,
            State::TableView { .. } => Phase::TableView,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Objects retrieved by the current or last operation.
    pub fn objects(&self) -> u32 {
        self.objects
    }

    /// PDUs sent by the current or last operation.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Accumulated `oid = value` lines of the current or last operation.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Token of the operation in flight.
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn get_from(&mut self, oid: &str) -> Option<Outgoing> {
        self.start_single(RequestKind::Get, Operation::Get, oid)
    }

    pub fn get_next_from(&mut self, oid: &str) -> Option<Outgoing> {
        self.start_single(RequestKind::GetNext, Operation::GetNext, oid)
    }

    /// Set `oid` to `value` parsed as `syntax`.
    pub fn set_from(&mut self, oid: &str, value: &str, syntax: ValueSyntax) -> Option<Outgoing> {
        let op = Operation::Set {
            value: value.to_owned(),
            syntax,
        };
        self.start_single(RequestKind::Set, op, oid)
    }

    pub fn walk_from(&mut self, oid: &str) -> Option<Outgoing> {
        self.start_walk(oid, false)
    }

    /// Walk a table subtree, collecting cells as they arrive.
    pub fn table_view_from(&mut self, oid: &str) -> Option<Outgoing> {
        self.start_walk(oid, true)
    }

    /// Ask a running walk to finish at its next reply.
    ///
    /// The request already on the wire is not cancelled; its reply is
    /// absorbed and discarded.
    pub fn stop_from(&mut self) {
        if matches!(self.state, State::Walking { .. } | State::TableView { .. }) {
            tracing::debug!(target: "snmp_poller::agent", "stop requested");
            self.stop_requested = true;
        }
    }

    fn begin(&mut self) -> u64 {
        if !self.is_idle() {
            tracing::debug!(target: "snmp_poller::agent", token = self.token, "abandoning operation in flight");
        }
        self.state = State::Idle;
        self.token = self.token.wrapping_add(1);
        self.objects = 0;
        self.requests = 0;
        self.message.clear();
        self.stop_requested = false;
        self.token
    }

    fn prepare(&mut self, op: &Operation, oid: &str) -> Result<(Target, Pdu, Oid)> {
        let (pdu, oid) = configure_pdu(op, oid)?;
        let mut target = Target::from_profile(self.version(), &self.profile, op.is_write())?;
        if let Some(retry) = &self.retry_override {
            target.retry = retry.clone();
        }
        Ok((target, pdu, oid))
    }

    fn start_single(&mut self, kind: RequestKind, op: Operation, oid: &str) -> Option<Outgoing> {
        let token = self.begin();
        match self.prepare(&op, oid) {
            Ok((target, pdu, oid)) => {
                tracing::debug!(target: "snmp_poller::agent", { snmp.oid = %oid, snmp.target = %target.addr, token }, "{kind:?} request");
                self.state = State::Awaiting { kind };
                Some(self.issue(token, target, pdu))
            }
            Err(e) => {
                self.reject(e);
                None
            }
        }
    }

    fn start_walk(&mut self, oid: &str, table: bool) -> Option<Outgoing> {
        let token = self.begin();
        let (target, pdu, root) = match self.prepare(&Operation::GetNext, oid) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.reject(e);
                return None;
            }
        };

        tracing::debug!(target: "snmp_poller::agent", { snmp.oid = %root, snmp.target = %target.addr, token, table }, "walk started");
        let last = root.clone();
        self.state = if table {
            State::TableView {
                table: Table::new(root.clone()),
                root,
                last,
                target: target.clone(),
            }
        } else {
            State::Walking {
                root,
                last,
                target: target.clone(),
            }
        };
        Some(self.issue(token, target, pdu))
    }

    fn issue(&mut self, token: u64, target: Target, pdu: Pdu) -> Outgoing {
        self.requests += 1;
        Outgoing { token, target, pdu }
    }

    fn reject(&mut self, error: Box<Error>) {
        if error.is_input_error() {
            tracing::debug!(target: "snmp_poller::agent", error = %error, "request rejected");
        } else {
            tracing::warn!(target: "snmp_poller::agent", error = %error, "request could not be prepared");
        }
        self.reporter.error(&error.to_string());
    }

    /// Feed a transport completion back into the core.
    ///
    /// Replies for an abandoned operation, or arriving while idle, are
    /// ignored. Returns the next request of a walk or table view.
    pub fn on_transport_reply(&mut self, token: u64, result: Result<Pdu>) -> Option<Outgoing> {
        if token != self.token || self.is_idle() {
            tracing::debug!(target: "snmp_poller::agent", { token, current = self.token }, "ignoring stray reply");
            return None;
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => None,
            State::Awaiting { kind } => {
                self.complete_single(kind, result);
                None
            }
            State::Walking { root, last, target } => {
                match self.walk_step(&root, &last, result) {
                    WalkStep::Continue(vb) => {
                        let pdu = Pdu::get_next_request(std::slice::from_ref(&vb.oid));
                        self.state = State::Walking {
                            root,
                            last: vb.oid,
                            target: target.clone(),
                        };
                        Some(self.issue(token, target, pdu))
                    }
                    WalkStep::Finish => {
                        self.finish_walk();
                        None
                    }
                }
            }
            State::TableView {
                root,
                last,
                target,
                mut table,
            } => match self.walk_step(&root, &last, result) {
                WalkStep::Continue(vb) => {
                    if let Some(cell) = table.insert(&vb.oid, vb.value.clone()) {
                        self.reporter.table_cell(&cell);
                    }
                    let pdu = Pdu::get_next_request(std::slice::from_ref(&vb.oid));
                    self.state = State::TableView {
                        root,
                        last: vb.oid,
                        target: target.clone(),
                        table,
                    };
                    Some(self.issue(token, target, pdu))
                }
                WalkStep::Finish => {
                    self.reporter.table_complete(&table);
                    self.finish_walk();
                    None
                }
            },
        }
    }

    /// A request task died before producing a reply.
    ///
    /// Completes the operation as if the transport had failed, so the core
    /// never stays stuck waiting on a token nothing will answer.
    pub fn on_task_failed(&mut self, token: u64, reason: &str) -> Option<Outgoing> {
        tracing::debug!(target: "snmp_poller::agent", { token, reason }, "completing failed request task");
        self.on_transport_reply(token, Err(Error::RequestFailed(reason.into()).boxed()))
    }

    fn complete_single(&mut self, kind: RequestKind, result: Result<Pdu>) {
        let vb = match result {
            Ok(pdu) => match pdu.varbinds.into_iter().next() {
                Some(vb) => vb,
                None => {
                    self.reporter.error("response carried no variable bindings");
                    return;
                }
            },
            Err(e) => {
                tracing::debug!(target: "snmp_poller::agent", { error = %e }, "{kind:?} failed");
                self.reporter.error(&e.to_string());
                return;
            }
        };

        let formatted = vb.value.to_string();
        let _ = writeln!(self.message, "{vb}");
        self.objects += 1;
        self.reporter.value(&vb.oid, &formatted);
    }

    fn walk_step(&mut self, root: &Oid, last: &Oid, result: Result<Pdu>) -> WalkStep {
        if self.stop_requested {
            tracing::debug!(target: "snmp_poller::agent", { snmp.oid = %last }, "walk stopped");
            return WalkStep::Finish;
        }

        let pdu = match result {
            Ok(pdu) => pdu,
            Err(e) => {
                // v1 agents end a walk with noSuchName rather than endOfMibView.
                if !matches!(*e, Error::Snmp { status: ErrorStatus::NoSuchName, .. }) {
                    self.reporter.error(&e.to_string());
                }
                return WalkStep::Finish;
            }
        };

        let Some(vb) = pdu.varbinds.into_iter().next() else {
            tracing::debug!(target: "snmp_poller::agent", "empty walk response");
            return WalkStep::Finish;
        };
        if matches!(
            vb.value,
            Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance
        ) {
            return WalkStep::Finish;
        }
        if !vb.oid.is_descendant_of(root) {
            tracing::trace!(target: "snmp_poller::agent", { snmp.oid = %vb.oid }, "left subtree");
            return WalkStep::Finish;
        }
        if vb.oid <= *last {
            tracing::warn!(target: "snmp_poller::agent", { snmp.oid = %vb.oid, snmp.previous = %last }, "agent returned non-increasing OID");
            return WalkStep::Finish;
        }

        let _ = writeln!(self.message, "{vb}");
        self.objects += 1;
        WalkStep::Continue(vb)
    }

    fn finish_walk(&mut self) {
        let _ = write!(
            self.message,
            "-----SNMP query finished-----\nTotal # of Requests = {}\nTotal # of Objects  = {}\n",
            self.requests, self.objects
        );
        tracing::debug!(target: "snmp_poller::agent", { requests = self.requests, objects = self.objects }, "walk finished");
        self.stop_requested = false;
        self.reporter.walk_complete(&self.message, self.objects);
    }
}
