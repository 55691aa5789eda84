//! Event-loop driver for [`AgentCore`].

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};

use super::correlator::{AgentCore, Outgoing};
use super::reporter::Reporter;
use crate::error::Result;
use crate::pdu::Pdu;
use crate::profile::AgentProfile;
use crate::session::{Retry, Session};
use crate::transport::Transport;
use crate::value::ValueSyntax;
use crate::version::Version;

#[derive(Debug)]
enum Command {
    Get(String),
    GetNext(String),
    Set {
        oid: String,
        value: String,
        syntax: ValueSyntax,
    },
    Walk(String),
    TableView(String),
    Stop,
    SelectProfile(AgentProfile),
    PreferVersion(Option<Version>),
}

/// Drives an agent from anywhere; results arrive at the runner's
/// [`Reporter`].
///
/// Every method is fire-and-forget. Once the runner has exited, commands
/// are dropped with a warning.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AgentHandle {
    fn send(&self, command: Command) {
        if let Err(e) = self.tx.send(command) {
            tracing::warn!(target: "snmp_poller::agent", command = ?e.0, "agent runner has stopped");
        }
    }

    pub fn get_from(&self, oid: impl Into<String>) {
        self.send(Command::Get(oid.into()));
    }

    pub fn get_next_from(&self, oid: impl Into<String>) {
        self.send(Command::GetNext(oid.into()));
    }

    pub fn set_from(&self, oid: impl Into<String>, value: impl Into<String>, syntax: ValueSyntax) {
        self.send(Command::Set {
            oid: oid.into(),
            value: value.into(),
            syntax,
        });
    }

    pub fn walk_from(&self, oid: impl Into<String>) {
        self.send(Command::Walk(oid.into()));
    }

    pub fn table_view_from(&self, oid: impl Into<String>) {
        self.send(Command::TableView(oid.into()));
    }

    pub fn stop_from(&self) {
        self.send(Command::Stop);
    }

    pub fn select_profile(&self, profile: AgentProfile) {
        self.send(Command::SelectProfile(profile));
    }

    /// Override the profile's version; `None` restores the profile's own.
    pub fn prefer_version(&self, version: Option<Version>) {
        self.send(Command::PreferVersion(version));
    }
}

/// Single task owning an [`AgentCore`].
///
/// Commands and transport completions are handled one at a time, so the
/// core is never touched concurrently. Requests run as separate tasks in a
/// `JoinSet`; an abandoned request still runs to completion and its reply
/// is discarded by the core.
///
/// ```rust,no_run
/// # async fn example() -> snmp_poller::Result<()> {
/// use snmp_poller::agent::{AgentRunner, ChannelReporter, Report};
/// use snmp_poller::transport::UdpTransport;
/// use snmp_poller::{AgentProfile, Session, Version};
///
/// let profile = AgentProfile::community("lab", "192.0.2.1", Version::V2c, "public");
/// let session = Session::new(UdpTransport::bind("0.0.0.0:0".parse().unwrap()).await?);
/// let (reporter, mut reports) = ChannelReporter::new();
/// let (runner, agent) = AgentRunner::new(session, profile, reporter);
/// tokio::spawn(runner.run());
///
/// agent.walk_from("1.3.6.1.2.1.1");
/// while let Some(report) = reports.recv().await {
///     if let Report::WalkComplete { message, .. } = report {
///         print!("{message}");
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct AgentRunner<T: Transport, R: Reporter> {
    core: AgentCore<R>,
    session: Session<T>,
    commands: mpsc::UnboundedReceiver<Command>,
    in_flight: JoinSet<(u64, Result<Pdu>)>,
    // token of every in-flight task, so a panicked task still reaches the core
    tokens: HashMap<task::Id, u64>,
}

impl<T: Transport, R: Reporter> AgentRunner<T, R> {
    pub fn new(session: Session<T>, profile: AgentProfile, reporter: R) -> (Self, AgentHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let runner = Self {
            core: AgentCore::new(profile, reporter),
            session,
            commands,
            in_flight: JoinSet::new(),
            tokens: HashMap::new(),
        };
        (runner, AgentHandle { tx })
    }

    /// Use `retry` for every request instead of the profile's retries.
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.core.set_retry(Some(retry));
        self
    }

    /// Process commands and completions until every handle is dropped and
    /// nothing is left in flight. Returns the reporter.
    pub async fn run(mut self) -> R {
        let mut closed = false;
        loop {
            if closed && self.in_flight.is_empty() {
                break;
            }
            tokio::select! {
                command = self.commands.recv(), if !closed => match command {
                    Some(command) => self.dispatch(command),
                    None => {
                        tracing::debug!(target: "snmp_poller::agent", "all agent handles dropped");
                        closed = true;
                    }
                },
                Some(joined) = self.in_flight.join_next_with_id() => match joined {
                    Ok((id, (token, result))) => {
                        self.tokens.remove(&id);
                        if let Some(next) = self.core.on_transport_reply(token, result) {
                            self.spawn(next);
                        }
                    }
                    Err(e) => {
                        tracing::error!(target: "snmp_poller::agent", error = %e, "request task failed");
                        let next = self
                            .tokens
                            .remove(&e.id())
                            .and_then(|token| self.core.on_task_failed(token, &e.to_string()));
                        if let Some(next) = next {
                            self.spawn(next);
                        }
                    }
                },
                else => break,
            }
        }
        self.core.into_reporter()
    }

    fn dispatch(&mut self, command: Command) {
        let outgoing = match command {
            Command::Get(oid) => self.core.get_from(&oid),
            Command::GetNext(oid) => self.core.get_next_from(&oid),
            Command::Set { oid, value, syntax } => self.core.set_from(&oid, &value, syntax),
            Command::Walk(oid) => self.core.walk_from(&oid),
            Command::TableView(oid) => self.core.table_view_from(&oid),
            Command::Stop => {
                self.core.stop_from();
                None
            }
            Command::SelectProfile(profile) => {
                self.core.select_profile(profile);
                None
            }
            Command::PreferVersion(version) => {
                self.core.prefer_version(version);
                None
            }
        };
        if let Some(outgoing) = outgoing {
            self.spawn(outgoing);
        }
    }

    fn spawn(&mut self, outgoing: Outgoing) {
        let session = self.session.clone();
        let Outgoing { token, target, pdu } = outgoing;
        let handle = self.in_flight.spawn(async move {
            let result = session.request(&target, pdu).await;
            (token, result)
        });
        self.tokens.insert(handle.id(), token);
    }
}
