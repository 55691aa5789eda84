//! Shared test infrastructure for snmp-poller.
//!
//! Provides TestAgent (in-process SNMP agent), fixtures, and helpers for
//! driving the agent runner over real UDP.

// Not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod agent;
pub mod fixtures;

pub use agent::TestAgent;
pub use fixtures::{
    COMMUNITY_RO, COMMUNITY_RW, ENGINE_ID, combined, if_in_octets, interface_table, interfaces_table_oid,
    nonexistent_oid, sys_descr, sys_name, sys_uptime, system_mib, system_subtree,
};

use std::net::SocketAddr;
use std::time::Duration;

use snmp_poller::agent::{AgentHandle, AgentRunner, ChannelReporter, Report};
use snmp_poller::{AgentProfile, Session, Target, UdpTransport, UsmProfile, Version};
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound on how long any single test waits for a report.
pub const REPORT_WAIT: Duration = Duration::from_secs(5);

/// A community profile pointing at `addr` with a one second timeout and
/// no retries.
pub fn profile_for(addr: SocketAddr, version: Version) -> AgentProfile {
    AgentProfile {
        name: "test".into(),
        address: addr.ip().to_string(),
        port: addr.port(),
        version,
        timeout_secs: 1,
        retries: 0,
        read_community: COMMUNITY_RO.into(),
        write_community: COMMUNITY_RW.into(),
        ..AgentProfile::default()
    }
}

/// A v3 profile for `usm` pointing at `addr`, same timeouts as
/// [`profile_for`].
pub fn profile_v3(addr: SocketAddr, usm: UsmProfile) -> AgentProfile {
    let mut profile = AgentProfile::usm("test-v3", addr.ip().to_string(), usm);
    profile.port = addr.port();
    profile.timeout_secs = 1;
    profile.retries = 0;
    profile
}

/// Spawn a runner for `profile` and return its handle plus the report stream.
pub async fn spawn_runner(profile: AgentProfile) -> (AgentHandle, UnboundedReceiver<Report>) {
    let target = Target::from_profile(profile.version, &profile, false).expect("valid profile");
    let session: Session<UdpTransport> = Session::udp_for(&target).await.expect("bind transport");
    let (reporter, reports) = ChannelReporter::new();
    let (runner, handle) = AgentRunner::new(session, profile, reporter);
    tokio::spawn(runner.run());
    (handle, reports)
}

/// Next report, failing the test if none arrives in time.
pub async fn next_report(reports: &mut UnboundedReceiver<Report>) -> Report {
    tokio::time::timeout(REPORT_WAIT, reports.recv())
        .await
        .expect("timed out waiting for report")
        .expect("report channel closed")
}

/// Skip reports until a walk completes; returns the skipped ones too.
pub async fn until_walk_complete(
    reports: &mut UnboundedReceiver<Report>,
) -> (Vec<Report>, String, u32) {
    let mut seen = Vec::new();
    loop {
        match next_report(reports).await {
            Report::WalkComplete { message, objects } => return (seen, message, objects),
            other => seen.push(other),
        }
    }
}
