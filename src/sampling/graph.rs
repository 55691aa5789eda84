//! A graph: up to [`NUM_PLOT_PER_GRAPH`] curves on one ticker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::history::{History, Sample};
use crate::agent::ValueSource;
use crate::error::{Error, GraphErrorKind, Result};
use crate::oid::Oid;

/// Curves one graph may hold.
pub const NUM_PLOT_PER_GRAPH: usize = 8;

/// Sampling period of every graph.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One plotted object.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub name: String,
    pub oid: Oid,
    pub history: History,
}

/// Copy of a curve handed to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSnapshot {
    pub name: String,
    pub oid: Oid,
    pub samples: Vec<Sample>,
}

/// Copy of a graph handed to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub name: String,
    /// Ticks taken so far.
    pub ticks: u64,
    pub curves: Vec<CurveSnapshot>,
}

/// Curves and tick counter, shared with the ticker task.
struct Shared {
    curves: Mutex<Vec<Curve>>,
    ticks: AtomicU64,
}

impl Shared {
    fn curves(&self) -> MutexGuard<'_, Vec<Curve>> {
        self.curves.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One sampling round. The lock is released while fetching.
    async fn sample_round<S: ValueSource>(&self, source: &S) -> usize {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let wanted: Vec<(String, Oid)> = self
            .curves()
            .iter()
            .map(|c| (c.name.clone(), c.oid.clone()))
            .collect();

        for (name, oid) in &wanted {
            let value = source.sample(oid).await;
            if value.is_none() {
                tracing::trace!(target: "snmp_poller::sampling", { curve = %name, snmp.oid = %oid, tick }, "sample gap");
            }
            // The curve may have been removed while we were fetching.
            {
                let mut curves = self.curves();
                if let Some(curve) = curves.iter_mut().find(|c| &c.name == name) {
                    curve.history.push(tick, value);
                }
            }
        }
        wanted.len()
    }
}

/// A named set of curves sampled together.
///
/// The ticker task exists exactly while the graph has at least one curve.
/// Curve changes must happen inside a tokio runtime since they may start
/// the ticker.
pub struct Graph<S: ValueSource> {
    name: String,
    shared: Arc<Shared>,
    source: Arc<S>,
    interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl<S: ValueSource> Graph<S> {
    pub(crate) fn new(name: String, source: Arc<S>, interval: Duration) -> Self {
        Self {
            name,
            shared: Arc::new(Shared {
                curves: Mutex::new(Vec::with_capacity(NUM_PLOT_PER_GRAPH)),
                ticks: AtomicU64::new(0),
            }),
            source,
            interval,
            ticker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn curve_count(&self) -> usize {
        self.shared.curves().len()
    }

    pub fn curve_names(&self) -> Vec<String> {
        self.shared.curves().iter().map(|c| c.name.clone()).collect()
    }

    /// Whether the periodic sampler is running.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Add a curve sampling `oid`.
    ///
    /// Returns `Ok(false)` without change when a curve of that name exists.
    pub(crate) fn add_curve(&mut self, name: &str, oid: Oid) -> Result<bool> {
        {
            let mut curves = self.shared.curves();
            if curves.iter().any(|c| c.name == name) {
                return Ok(false);
            }
            if curves.len() >= NUM_PLOT_PER_GRAPH {
                return Err(Error::graph(&self.name, GraphErrorKind::GraphFull));
            }
            curves.push(Curve {
                name: name.to_owned(),
                oid,
                history: History::new(),
            });
        }
        tracing::debug!(target: "snmp_poller::sampling", { graph = %self.name, curve = name }, "curve added");
        self.start_ticker();
        Ok(true)
    }

    pub(crate) fn remove_curve(&mut self, name: &str) -> Result<()> {
        let remaining = {
            let mut curves = self.shared.curves();
            let Some(pos) = curves.iter().position(|c| c.name == name) else {
                return Err(Error::graph(&self.name, GraphErrorKind::UnknownCurve));
            };
            curves.remove(pos);
            curves.len()
        };
        tracing::debug!(target: "snmp_poller::sampling", { graph = %self.name, curve = name }, "curve removed");
        if remaining == 0 {
            self.stop_ticker();
        }
        Ok(())
    }

    /// Run one sampling round now: every curve, in order, one at a time.
    ///
    /// Returns the number of curves sampled.
    pub async fn tick(&self) -> usize {
        self.shared.sample_round(&*self.source).await
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let curves = self
            .shared
            .curves()
            .iter()
            .map(|c| CurveSnapshot {
                name: c.name.clone(),
                oid: c.oid.clone(),
                samples: c.history.to_vec(),
            })
            .collect();
        GraphSnapshot {
            name: self.name.clone(),
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            curves,
        }
    }

    fn start_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let shared = self.shared.clone();
        let source = self.source.clone();
        let period = self.interval;
        let graph = self.name.clone();

        tracing::debug!(target: "snmp_poller::sampling", { graph = %graph, period_ms = period.as_millis() as u64 }, "ticker started");
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sampled = shared.sample_round(&*source).await;
                tracing::trace!(target: "snmp_poller::sampling", { graph = %graph, sampled }, "tick");
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            tracing::debug!(target: "snmp_poller::sampling", graph = %self.name, "ticker stopped");
        }
    }
}

impl<S: ValueSource> Drop for Graph<S> {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

impl<S: ValueSource> std::fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("curves", &self.curve_names())
            .field("ticking", &self.is_ticking())
            .finish()
    }
}
