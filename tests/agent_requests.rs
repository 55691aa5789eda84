//! Get, GetNext, Set, walk and table view through the agent runner over UDP.

mod common;

use common::{
    TestAgent, fixtures, next_report, profile_for, spawn_runner, until_walk_complete,
};
use snmp_poller::agent::Report;
use snmp_poller::{Value, ValueSyntax, Version, oid};

#[tokio::test]
async fn get_reports_formatted_value() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.get_from("1.3.6.1.2.1.1.1.0");

    assert_eq!(
        next_report(&mut reports).await,
        Report::Value {
            oid: fixtures::sys_descr(),
            formatted: "Test SNMP Agent".into(),
        }
    );
}

#[tokio::test]
async fn get_accepts_leading_dot() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V1)).await;

    handle.get_from(".1.3.6.1.2.1.1.5.0");

    match next_report(&mut reports).await {
        Report::Value { oid, formatted } => {
            assert_eq!(oid, fixtures::sys_name());
            assert_eq!(formatted, "test-agent");
        }
        other => panic!("expected value, got {other:?}"),
    }
}

#[tokio::test]
async fn get_next_reports_successor() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.get_next_from("1.3.6.1.2.1.1.1.0");

    match next_report(&mut reports).await {
        Report::Value { oid, formatted } => {
            assert_eq!(oid, oid!(1, 3, 6, 1, 2, 1, 1, 2, 0));
            assert_eq!(formatted, "1.3.6.1.4.1.99999");
        }
        other => panic!("expected value, got {other:?}"),
    }
}

#[tokio::test]
async fn get_missing_object_v2c_is_exception_value() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.get_from(&fixtures::nonexistent_oid().to_string());

    match next_report(&mut reports).await {
        Report::Value { formatted, .. } => assert_eq!(formatted, "noSuchObject"),
        other => panic!("expected value, got {other:?}"),
    }
}

#[tokio::test]
async fn get_missing_object_v1_is_error() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V1)).await;

    handle.get_from(&fixtures::nonexistent_oid().to_string());

    match next_report(&mut reports).await {
        Report::Error(message) => assert!(message.contains("noSuchName"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_oid_is_reported_without_sending() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.get_from("1.3.six.1");

    assert!(matches!(next_report(&mut reports).await, Report::Error(_)));
    assert_eq!(agent.request_count(), 0);
}

#[tokio::test]
async fn unencodable_oid_reports_error() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    // 2.x encodes as 80 + x, past the 32-bit sub-identifier limit
    handle.get_from("2.4294967295");

    match next_report(&mut reports).await {
        Report::Error(message) => assert!(message.contains("4294967295"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(agent.request_count(), 0);

    // the runner is still alive afterwards
    handle.get_from("1.3.6.1.2.1.1.5.0");
    assert!(matches!(next_report(&mut reports).await, Report::Value { .. }));
}

#[tokio::test]
async fn set_uses_write_community_and_updates_agent() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.set_from("1.3.6.1.2.1.1.5.0", "core-sw", ValueSyntax::String);

    match next_report(&mut reports).await {
        Report::Value { oid, formatted } => {
            assert_eq!(oid, fixtures::sys_name());
            assert_eq!(formatted, "core-sw");
        }
        other => panic!("expected value, got {other:?}"),
    }
    assert_eq!(agent.get(&fixtures::sys_name()), Some(Value::from("core-sw")));
}

#[tokio::test]
async fn set_rejected_by_agent_is_error() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.set_from("1.3.6.1.2.1.1.99.0", "7", ValueSyntax::Integer);

    match next_report(&mut reports).await {
        Report::Error(message) => assert!(message.contains("notWritable"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn set_with_bad_value_text_is_error() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.set_from("1.3.6.1.2.1.1.7.0", "many", ValueSyntax::Integer);

    assert!(matches!(next_report(&mut reports).await, Report::Error(_)));
    assert_eq!(agent.get(&oid!(1, 3, 6, 1, 2, 1, 1, 7, 0)), Some(Value::Integer(72)));
}

#[tokio::test]
async fn walk_collects_subtree_and_summary() {
    let agent = TestAgent::with_data(fixtures::combined(2)).await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.walk_from("1.3.6.1.2.1.1");

    let (others, message, objects) = until_walk_complete(&mut reports).await;
    assert!(others.is_empty());
    assert_eq!(objects, 7);

    let lines: Vec<&str> = message.lines().collect();
    assert_eq!(lines[0], "1.3.6.1.2.1.1.1.0 = Test SNMP Agent");
    assert_eq!(lines[6], "1.3.6.1.2.1.1.7.0 = 72");
    assert_eq!(lines[7], "-----SNMP query finished-----");
    // 7 objects plus the request that left the subtree
    assert_eq!(lines[8], "Total # of Requests = 8");
    assert_eq!(lines[9], "Total # of Objects  = 7");
}

#[tokio::test]
async fn walk_v2c_ends_at_end_of_mib_view() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.walk_from("1.3.6.1.2.1.1.5");

    let (others, message, objects) = until_walk_complete(&mut reports).await;
    assert!(others.is_empty());
    assert_eq!(objects, 1);
    assert!(message.starts_with("1.3.6.1.2.1.1.5.0 = test-agent\n"));
}

#[tokio::test]
async fn walk_v1_treats_no_such_name_as_end() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V1)).await;

    handle.walk_from("1.3.6.1.2.1.1");

    let (others, message, objects) = until_walk_complete(&mut reports).await;
    assert!(
        others.iter().all(|r| !matches!(r, Report::Error(_))),
        "{others:?}"
    );
    assert_eq!(objects, 7);
    assert!(message.contains("Total # of Requests = 8"));
}

#[tokio::test]
async fn walk_of_empty_subtree_finishes_with_zero_objects() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.walk_from("1.3.6.1.2.1.1.99");

    let (_, message, objects) = until_walk_complete(&mut reports).await;
    assert_eq!(objects, 0);
    assert!(message.starts_with("-----SNMP query finished-----"));
    assert!(message.contains("Total # of Requests = 1"));
}

#[tokio::test]
async fn table_view_assembles_rows_and_columns() {
    let agent = TestAgent::with_data(fixtures::combined(3)).await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.table_view_from("1.3.6.1.2.1.2.2");

    let (others, _, objects) = until_walk_complete(&mut reports).await;
    assert_eq!(objects, 15);

    let cells = others
        .iter()
        .filter(|r| matches!(r, Report::TableCell(_)))
        .count();
    assert_eq!(cells, 15);

    let table = others
        .iter()
        .find_map(|r| match r {
            Report::TableComplete(table) => Some(table),
            _ => None,
        })
        .expect("table complete report");
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.columns().collect::<Vec<_>>(), [1, 2, 3, 10, 16]);
    assert_eq!(table.get(&oid!(2), 2), Some(&Value::from("eth1")));
    assert_eq!(table.get(&oid!(3), 10), Some(&Value::Counter32(3000)));
}

#[tokio::test]
async fn stop_cuts_a_long_walk_short() {
    let agent = TestAgent::with_data(fixtures::interface_table(200)).await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.walk_from("1.3.6.1.2.1.2.2");
    handle.stop_from();

    let (_, message, objects) = until_walk_complete(&mut reports).await;
    assert!(objects < 100, "walk was not stopped: {objects} objects");
    assert!(message.contains("-----SNMP query finished-----"));
}

#[tokio::test]
async fn new_operation_supersedes_walk() {
    let agent = TestAgent::with_data(fixtures::combined(200)).await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.walk_from("1.3.6.1.2.1.2.2");
    handle.get_from("1.3.6.1.2.1.1.5.0");

    // The abandoned walk never completes; the get is the only result.
    match next_report(&mut reports).await {
        Report::Value { oid, .. } => assert_eq!(oid, fixtures::sys_name()),
        other => panic!("expected value, got {other:?}"),
    }
    let late = tokio::time::timeout(std::time::Duration::from_millis(200), reports.recv()).await;
    assert!(late.is_err(), "unexpected report {late:?}");
}

#[tokio::test]
async fn select_profile_switches_agent() {
    let first = TestAgent::new().await;
    let mut data = fixtures::system_mib();
    data.insert(fixtures::sys_name(), Value::from("second-agent"));
    let second = TestAgent::with_data(data).await;

    let (handle, mut reports) = spawn_runner(profile_for(first.addr(), Version::V2c)).await;
    handle.select_profile(profile_for(second.addr(), Version::V2c));
    handle.get_from("1.3.6.1.2.1.1.5.0");

    match next_report(&mut reports).await {
        Report::Value { formatted, .. } => assert_eq!(formatted, "second-agent"),
        other => panic!("expected value, got {other:?}"),
    }
    assert_eq!(first.request_count(), 0);
}

#[tokio::test]
async fn prefer_version_overrides_profile() {
    let agent = TestAgent::new().await;
    let (handle, mut reports) = spawn_runner(profile_for(agent.addr(), Version::V2c)).await;

    handle.prefer_version(Some(Version::V1));
    handle.get_from(&fixtures::nonexistent_oid().to_string());

    // v1 semantics: an error rather than a noSuchObject value
    assert!(matches!(next_report(&mut reports).await, Report::Error(_)));
}

#[tokio::test]
async fn lost_request_is_retried() {
    let agent = TestAgent::new().await;
    let mut profile = profile_for(agent.addr(), Version::V2c);
    profile.retries = 1;
    let (handle, mut reports) = spawn_runner(profile).await;

    agent.drop_next(1);
    handle.get_from("1.3.6.1.2.1.1.3.0");

    match next_report(&mut reports).await {
        Report::Value { oid, .. } => assert_eq!(oid, fixtures::sys_uptime()),
        other => panic!("expected value, got {other:?}"),
    }
    assert_eq!(agent.request_count(), 2);
}
