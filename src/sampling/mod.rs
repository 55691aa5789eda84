//! Periodic sampling for live graphs.
//!
//! A [`SamplingFeed`] owns named [`Graph`]s. Each graph holds up to
//! [`NUM_PLOT_PER_GRAPH`] curves and, while it has any, a ticker that once
//! per [`TICK_INTERVAL`] asks the feed's [`ValueSource`] for every curve's
//! value and pushes it into that curve's [`History`].
//!
//! ```rust,no_run
//! # async fn example() -> snmp_poller::Result<()> {
//! use snmp_poller::sampling::SamplingFeed;
//! use snmp_poller::{AgentProfile, SyncFetcher, Version};
//!
//! let profile = AgentProfile::community("lab", "192.0.2.1", Version::V2c, "public");
//! let mut feed = SamplingFeed::new(SyncFetcher::from_profile(&profile).await?);
//! feed.create_graph("uplink")?;
//! feed.add_curve("uplink", "ifInOctets.1", "1.3.6.1.2.1.2.2.1.10.1")?;
//! feed.add_curve("uplink", "ifOutOctets.1", "1.3.6.1.2.1.2.2.1.16.1")?;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! for curve in feed.snapshot("uplink").unwrap().curves {
//!     println!("{}: {:?}", curve.name, curve.samples.last());
//! }
//! # Ok(())
//! # }
//! ```

mod graph;
mod history;

pub use graph::{Curve, CurveSnapshot, Graph, GraphSnapshot, NUM_PLOT_PER_GRAPH, TICK_INTERVAL};
pub use history::{History, PLOT_HISTORY, Sample};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::ValueSource;
use crate::error::{Error, GraphErrorKind, Result};
use crate::oid::Oid;

/// All open graphs and the source they sample from.
pub struct SamplingFeed<S: ValueSource> {
    source: Arc<S>,
    interval: Duration,
    graphs: BTreeMap<String, Graph<S>>,
}

impl<S: ValueSource> SamplingFeed<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, TICK_INTERVAL)
    }

    /// Feed whose graphs tick every `interval` instead of once a second.
    pub fn with_interval(source: S, interval: Duration) -> Self {
        Self {
            source: Arc::new(source),
            interval,
            graphs: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn create_graph(&mut self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::graph(name, GraphErrorKind::EmptyName));
        }
        if self.graphs.contains_key(name) {
            return Err(Error::graph(name, GraphErrorKind::DuplicateGraph));
        }
        let graph = Graph::new(name.to_owned(), self.source.clone(), self.interval);
        self.graphs.insert(name.to_owned(), graph);
        tracing::debug!(target: "snmp_poller::sampling", graph = name, "graph created");
        Ok(())
    }

    /// Delete a graph, stopping its ticker and dropping its curves.
    pub fn delete_graph(&mut self, name: &str) -> Result<()> {
        match self.graphs.remove(name) {
            Some(_) => {
                tracing::debug!(target: "snmp_poller::sampling", graph = name, "graph deleted");
                Ok(())
            }
            None => Err(Error::graph(name, GraphErrorKind::UnknownGraph)),
        }
    }

    /// Add a curve named `curve` sampling `oid` to `graph`.
    ///
    /// Returns `Ok(false)` if the graph already has a curve of that name.
    /// The first curve of a graph starts its ticker.
    pub fn add_curve(&mut self, graph: &str, curve: &str, oid: &str) -> Result<bool> {
        let oid = Oid::parse(oid)?;
        self.graph_mut(graph)?.add_curve(curve, oid)
    }

    /// Remove a curve; removing the last one stops the graph's ticker.
    pub fn remove_curve(&mut self, graph: &str, curve: &str) -> Result<()> {
        self.graph_mut(graph)?.remove_curve(curve)
    }

    pub fn graph(&self, name: &str) -> Option<&Graph<S>> {
        self.graphs.get(name)
    }

    fn graph_mut(&mut self, name: &str) -> Result<&mut Graph<S>> {
        self.graphs
            .get_mut(name)
            .ok_or_else(|| Error::graph(name, GraphErrorKind::UnknownGraph))
    }

    pub fn graph_names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn snapshot(&self, graph: &str) -> Option<GraphSnapshot> {
        self.graphs.get(graph).map(Graph::snapshot)
    }

    /// Sample every curve of every graph once, graph by graph.
    pub async fn tick_all(&self) -> usize {
        let mut sampled = 0;
        for graph in self.graphs.values() {
            sampled += graph.tick().await;
        }
        sampled
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::oid;

    /// Readings per OID; missing OIDs fail.
    #[derive(Default)]
    struct FakeSource {
        values: Mutex<HashMap<Oid, u64>>,
        calls: Mutex<Vec<Oid>>,
    }

    impl FakeSource {
        fn with(values: &[(Oid, u64)]) -> Self {
            Self {
                values: Mutex::new(values.iter().cloned().collect()),
                calls: Mutex::default(),
            }
        }
    }

    impl ValueSource for FakeSource {
        async fn sample(&self, oid: &Oid) -> Option<u64> {
            self.calls.lock().unwrap().push(oid.clone());
            self.values.lock().unwrap().get(oid).copied()
        }
    }

    #[tokio::test]
    async fn graph_names_must_be_unique_and_non_empty() {
        let mut feed = SamplingFeed::new(FakeSource::default());
        feed.create_graph("cpu").unwrap();
        let dup = feed.create_graph("cpu").unwrap_err();
        assert!(matches!(*dup, Error::Graph { kind: GraphErrorKind::DuplicateGraph, .. }));
        let empty = feed.create_graph(" ").unwrap_err();
        assert!(matches!(*empty, Error::Graph { kind: GraphErrorKind::EmptyName, .. }));
    }

    #[tokio::test]
    async fn ticker_runs_only_while_curves_exist() {
        let mut feed = SamplingFeed::new(FakeSource::default());
        feed.create_graph("if").unwrap();
        assert!(!feed.graph("if").unwrap().is_ticking());

        assert!(feed.add_curve("if", "in", "1.3.6.1.2.1.2.2.1.10.1").unwrap());
        assert!(feed.graph("if").unwrap().is_ticking());
        assert!(!feed.add_curve("if", "in", "1.3.6.1.2.1.2.2.1.10.2").unwrap());
        assert_eq!(feed.graph("if").unwrap().curve_count(), 1);

        feed.remove_curve("if", "in").unwrap();
        assert!(!feed.graph("if").unwrap().is_ticking());
    }

    #[tokio::test]
    async fn full_graph_rejects_new_curves() {
        let mut feed = SamplingFeed::new(FakeSource::default());
        feed.create_graph("g").unwrap();
        for i in 0..NUM_PLOT_PER_GRAPH {
            feed.add_curve("g", &format!("c{i}"), "1.3.6.1.2.1.1.3.0").unwrap();
        }
        let err = feed.add_curve("g", "extra", "1.3.6.1.2.1.1.3.0").unwrap_err();
        assert!(matches!(*err, Error::Graph { kind: GraphErrorKind::GraphFull, .. }));
    }

    #[tokio::test]
    async fn unknown_graph_and_curve_rejected() {
        let mut feed = SamplingFeed::new(FakeSource::default());
        assert!(feed.add_curve("nope", "c", "1.3.6.1").is_err());
        feed.create_graph("g").unwrap();
        let err = feed.remove_curve("g", "c").unwrap_err();
        assert!(matches!(*err, Error::Graph { kind: GraphErrorKind::UnknownCurve, .. }));
        assert!(matches!(*feed.add_curve("g", "c", "1..3").unwrap_err(), Error::InvalidOid(_)));
        assert!(feed.delete_graph("missing").is_err());
    }

    #[tokio::test]
    async fn manual_tick_samples_in_curve_order_and_records_gaps() {
        let uptime = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
        let in_octets = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 1);
        let mut feed = SamplingFeed::new(FakeSource::with(&[(uptime.clone(), 500)]));
        feed.create_graph("g").unwrap();
        feed.add_curve("g", "uptime", "1.3.6.1.2.1.1.3.0").unwrap();
        feed.add_curve("g", "in", "1.3.6.1.2.1.2.2.1.10.1").unwrap();

        assert_eq!(feed.tick_all().await, 2);
        assert_eq!(*feed.source().calls.lock().unwrap(), [uptime, in_octets]);

        let snap = feed.snapshot("g").unwrap();
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.curves[0].samples, [Sample { tick: 0, value: Some(500) }]);
        assert_eq!(snap.curves[1].samples, [Sample { tick: 0, value: None }]);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_samples_once_per_interval() {
        let uptime = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
        let mut feed = SamplingFeed::new(FakeSource::with(&[(uptime, 42)]));
        feed.create_graph("g").unwrap();
        feed.add_curve("g", "uptime", "1.3.6.1.2.1.1.3.0").unwrap();

        // First tick comes one interval after the first curve is added
        tokio::time::sleep(TICK_INTERVAL / 2).await;
        assert_eq!(feed.snapshot("g").unwrap().ticks, 0);

        tokio::time::sleep(TICK_INTERVAL * 3).await;
        let snap = feed.snapshot("g").unwrap();
        assert_eq!(snap.ticks, 3);
        let ticks: Vec<u64> = snap.curves[0].samples.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, [0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn history_window_slides_after_capacity() {
        let mut feed = SamplingFeed::new(FakeSource::default());
        feed.create_graph("g").unwrap();
        feed.add_curve("g", "gone", "1.3.6.1.2.1.1.99.0").unwrap();

        let rounds = PLOT_HISTORY as u32 + 5;
        tokio::time::sleep(TICK_INTERVAL * rounds + TICK_INTERVAL / 2).await;

        let samples = &feed.snapshot("g").unwrap().curves[0].samples;
        assert_eq!(samples.len(), PLOT_HISTORY);
        assert_eq!(samples[0].tick, 5);
        assert_eq!(samples[PLOT_HISTORY - 1].tick, u64::from(rounds) - 1);
        // failed samples leave gaps but still advance the time axis
        assert!(samples.iter().all(|s| s.value.is_none()));
    }
}
