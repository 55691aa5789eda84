//! Property-based tests for snmp-poller.
//!
//! The walk test shares one runtime and TestAgent across cases; each case
//! writes its objects under its own enterprise arc.

mod common;

use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use common::{TestAgent, profile_for, spawn_runner, until_walk_complete};
use proptest::prelude::*;
use snmp_poller::agent::Table;
use snmp_poller::oid::Oid;
use snmp_poller::sampling::History;
use snmp_poller::{Value, Version};
use tokio::runtime::Runtime;

// =============================================================================
// Shared Test Environment
// =============================================================================

struct SharedEnv {
    runtime: Runtime,
    agent: TestAgent,
    case_counter: AtomicU32,
}

impl SharedEnv {
    fn new() -> Self {
        let runtime = Runtime::new().expect("failed to create runtime");
        let agent = runtime.block_on(TestAgent::new());
        Self {
            runtime,
            agent,
            case_counter: AtomicU32::new(0),
        }
    }

    fn next_case_id(&self) -> u32 {
        self.case_counter.fetch_add(1, Ordering::Relaxed)
    }
}

fn env() -> &'static SharedEnv {
    static ENV: OnceLock<SharedEnv> = OnceLock::new();
    ENV.get_or_init(SharedEnv::new)
}

// =============================================================================
// Strategies
// =============================================================================

fn arcs() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..64, 1..10)
}

/// Suffixes below a case root: 1..=4 arcs, each non-empty set deduplicated.
fn suffixes() -> impl Strategy<Value = BTreeSet<Vec<u32>>> {
    prop::collection::btree_set(prop::collection::vec(1u32..5, 1..4), 1..20)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn oid_order_matches_arc_order(a in arcs(), b in arcs()) {
        let (x, y) = (Oid::from_slice(&a), Oid::from_slice(&b));
        prop_assert_eq!(x.cmp(&y), a.cmp(&b));
    }

    #[test]
    fn descendant_means_strict_prefix(a in arcs(), b in arcs()) {
        let (root, oid) = (Oid::from_slice(&a), Oid::from_slice(&b));
        let expected = b.len() > a.len() && b.starts_with(&a);
        prop_assert_eq!(oid.is_descendant_of(&root), expected);
    }

    #[test]
    fn history_keeps_latest_within_capacity(
        capacity in 1usize..50,
        values in prop::collection::vec(prop::option::of(any::<u64>()), 0..200),
    ) {
        let mut history = History::with_capacity(capacity);
        for (tick, value) in values.iter().enumerate() {
            history.push(tick as u64, *value);
        }

        let kept = values.len().min(capacity);
        prop_assert_eq!(history.len(), kept);
        prop_assert!(history.len() <= history.capacity());

        let first_kept = (values.len() - kept) as u64;
        let ticks: Vec<u64> = history.timestamps().collect();
        let expected: Vec<u64> = (first_kept..values.len() as u64).collect();
        prop_assert_eq!(ticks, expected);

        let retained: Vec<Option<u64>> = history.values().collect();
        prop_assert_eq!(&retained[..], &values[values.len() - kept..]);
    }

    #[test]
    fn table_files_every_cell_once(
        cells in prop::collection::btree_set((1u32..8, prop::collection::vec(0u32..5, 1..3)), 1..30),
    ) {
        let root = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2]);
        let mut table = Table::new(root.clone());

        for (column, index) in &cells {
            let mut arcs = root.arcs().to_vec();
            arcs.push(1);
            arcs.push(*column);
            arcs.extend(index);
            let cell = table.insert(&Oid::from_slice(&arcs), Value::Integer(*column as i32));
            prop_assert!(cell.is_some());
        }

        let rows: BTreeSet<&Vec<u32>> = cells.iter().map(|(_, index)| index).collect();
        prop_assert_eq!(table.row_count(), rows.len());
        for (column, index) in &cells {
            prop_assert_eq!(
                table.get(&Oid::from_slice(index), *column),
                Some(&Value::Integer(*column as i32))
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn walk_returns_exactly_the_subtree(suffixes in suffixes()) {
        let env = env();
        let case = env.next_case_id();
        let root = Oid::from_slice(&[1, 3, 6, 1, 4, 1, 50000, case]);

        for suffix in &suffixes {
            let mut arcs = root.arcs().to_vec();
            arcs.extend(suffix);
            env.agent.set(Oid::from_slice(&arcs), Value::Counter32(suffix.len() as u32));
        }

        let (objects, message) = env.runtime.block_on(async {
            let (handle, mut reports) = spawn_runner(profile_for(env.agent.addr(), Version::V2c)).await;
            handle.walk_from(root.to_string());
            let (_, message, objects) = until_walk_complete(&mut reports).await;
            (objects, message)
        });

        prop_assert_eq!(objects as usize, suffixes.len());
        let walked: Vec<&str> = message
            .lines()
            .take_while(|l| !l.starts_with("-----"))
            .collect();
        prop_assert_eq!(walked.len(), suffixes.len());
        for (line, suffix) in walked.iter().zip(&suffixes) {
            let mut arcs = root.arcs().to_vec();
            arcs.extend(suffix);
            let expected = format!("{} = ", Oid::from_slice(&arcs));
            prop_assert!(line.starts_with(&expected), "{} vs {}", line, expected);
        }
    }
}
