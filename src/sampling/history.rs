//! Fixed-capacity sample window.

use std::collections::VecDeque;

/// Samples kept per curve.
pub const PLOT_HISTORY: usize = 100;

/// One reading on a graph's time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Graph tick the reading was taken on.
    pub tick: u64,
    /// `None` when the fetch failed.
    pub value: Option<u64>,
}

/// Rolling window of the most recent samples, oldest first.
///
/// ```
/// use snmp_poller::sampling::History;
///
/// let mut history = History::with_capacity(2);
/// history.push(0, Some(10));
/// history.push(1, None);
/// history.push(2, Some(30));
/// assert_eq!(history.timestamps().collect::<Vec<_>>(), [1, 2]);
/// assert_eq!(history.values().collect::<Vec<_>>(), [None, Some(30)]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(PLOT_HISTORY)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest once full.
    pub fn push(&mut self, tick: u64, value: Option<u64>) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { tick, value });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Time axis, oldest first.
    pub fn timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().map(|s| s.tick)
    }

    /// Value axis, oldest first.
    pub fn values(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}
