//! Command-line front-end shared by the `snmp-poller` binary.

pub mod args;
pub mod output;
