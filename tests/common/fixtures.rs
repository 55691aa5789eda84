//! Standard test fixtures with realistic MIB data.

use snmp_poller::{AuthProtocol, Oid, PrivProtocol, UsmProfile, Value, oid};
use std::collections::BTreeMap;

pub const COMMUNITY_RO: &str = "public";
pub const COMMUNITY_RW: &str = "private";

/// snmpEngineID of every TestAgent (enterprise 99999, text format).
pub const ENGINE_ID: &[u8] = b"\x80\x01\x86\x9f\x04test-agent";

// =============================================================================
// USM users (for TestAgent::v3)
// =============================================================================

pub fn no_auth_user() -> UsmProfile {
    UsmProfile::new("observer")
}

pub fn auth_user() -> UsmProfile {
    UsmProfile::new("operator").with_auth(AuthProtocol::Sha256, "operator-auth")
}

pub fn aes_user() -> UsmProfile {
    UsmProfile::new("admin")
        .with_auth(AuthProtocol::Sha, "admin-auth-pass")
        .with_privacy(PrivProtocol::Aes, "admin-priv-pass")
}

pub fn des_user() -> UsmProfile {
    UsmProfile::new("legacy")
        .with_auth(AuthProtocol::Md5, "legacy-auth")
        .with_privacy(PrivProtocol::Des, "legacy-priv")
}

pub fn usm_users() -> Vec<UsmProfile> {
    vec![no_auth_user(), auth_user(), aes_user(), des_user()]
}

// =============================================================================
// MIB data fixtures (for TestAgent)
// =============================================================================

/// Standard system MIB entries (1.3.6.1.2.1.1).
///
/// Returns OIDs for:
/// - sysDescr.0 (1.3.6.1.2.1.1.1.0)
/// - sysObjectID.0 (1.3.6.1.2.1.1.2.0)
/// - sysUpTime.0 (1.3.6.1.2.1.1.3.0)
/// - sysContact.0 (1.3.6.1.2.1.1.4.0)
/// - sysName.0 (1.3.6.1.2.1.1.5.0)
/// - sysLocation.0 (1.3.6.1.2.1.1.6.0)
/// - sysServices.0 (1.3.6.1.2.1.1.7.0)
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();

    data.insert(sys_descr(), Value::from("Test SNMP Agent"));
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 99999)),
    );
    data.insert(sys_uptime(), Value::TimeTicks(123456));
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 4, 0),
        Value::from("admin@test.local"),
    );
    data.insert(sys_name(), Value::from("test-agent"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("Test Lab"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), Value::Integer(72));

    data
}

/// Interface table entries for walks and table views.
///
/// Creates `count` rows of ifIndex, ifDescr, ifType, ifInOctets and
/// ifOutOctets, plus ifNumber.0.
pub fn interface_table(count: usize) -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();

    // ifNumber.0
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 2, 1, 0),
        Value::Integer(count as i32),
    );

    for i in 1..=count as u32 {
        let entry = |column: u32| oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, column, i);
        data.insert(entry(1), Value::Integer(i as i32));
        data.insert(entry(2), Value::from(format!("eth{}", i - 1)));
        data.insert(entry(3), Value::Integer(6));
        data.insert(entry(10), Value::Counter32(i * 1000));
        data.insert(entry(16), Value::Counter32(i * 500));
    }

    data
}

/// System MIB plus `interfaces` interface rows.
pub fn combined(interfaces: usize) -> BTreeMap<Oid, Value> {
    let mut data = system_mib();
    data.extend(interface_table(interfaces));
    data
}

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// ifTable (1.3.6.1.2.1.2.2).
pub fn interfaces_table_oid() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2)
}

/// ifInOctets for interface `index`.
pub fn if_in_octets(index: u32) -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, index)
}

/// An OID no fixture populates.
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 99, 0)
}
