//! # Error metrics.
//!
//! [`ErrorTally`] keeps, for one activity:
//! - how many failed attempts resolved to each [`Response`];
//! - a counter per classifier for failures handled by a chain with `count`;
//! - a [`LatencyHistogram`] per classifier for failures handled by a chain with `histogram`.
//!
//! Counters are lock-free; the per-classifier maps take a write lock only the first time a
//! classifier is seen.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::response::Response;

/// Upper bounds (µs) of the histogram buckets; one overflow bucket follows.
const BOUNDS_MICROS: [u64; 12] = [
    100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000, 500_000, 1_000_000,
];

/// Fixed-bucket latency histogram.
#[derive(Debug)]
pub struct LatencyHistogram {
    counts: [AtomicU64; BOUNDS_MICROS.len() + 1],
    count: AtomicU64,
    sum_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            max_micros: AtomicU64::new(0),
        }
    }
}

impl LatencyHistogram {
    /// Records one observation.
    pub fn observe(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let idx = BOUNDS_MICROS
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(BOUNDS_MICROS.len());

        self.counts[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);

        let mut current = self.sum_micros.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(micros);
            match self.sum_micros.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(v) => current = v,
            }
        }
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean latency, or zero without observations.
    pub fn mean(&self) -> Duration {
        let n = self.count();
        if n == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.sum_micros.load(Ordering::Relaxed) / n)
    }

    /// Largest latency observed.
    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros.load(Ordering::Relaxed))
    }

    /// `(upper bound, count)` per bucket; the overflow bucket reports `None`.
    pub fn buckets(&self) -> Vec<(Option<Duration>, u64)> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let bound = BOUNDS_MICROS.get(i).map(|b| Duration::from_micros(*b));
                (bound, c.load(Ordering::Relaxed))
            })
            .collect()
    }
}

/// Per-activity failure accounting.
#[derive(Debug, Default)]
pub struct ErrorTally {
    by_response: [AtomicU64; Response::ALL.len()],
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    histograms: RwLock<HashMap<String, Arc<LatencyHistogram>>>,
}

impl ErrorTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failed attempt resolved to `response`.
    pub fn record(&self, response: Response) {
        self.by_response[response.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one failure of `classifier`.
    pub fn count(&self, classifier: &str) {
        self.counter(classifier).fetch_add(1, Ordering::Relaxed);
    }

    /// Records the latency of one failure of `classifier`.
    pub fn observe(&self, classifier: &str, elapsed: Duration) {
        self.histogram(classifier).observe(elapsed);
    }

    /// Failures resolved to `response` so far.
    pub fn responses(&self, response: Response) -> u64 {
        self.by_response[response.index()].load(Ordering::Relaxed)
    }

    /// Failures of `classifier` counted so far.
    pub fn count_for(&self, classifier: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(classifier)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Histogram recorded for `classifier` under the `histogram` response.
    pub fn histogram_for(&self, classifier: &str) -> Option<Arc<LatencyHistogram>> {
        self.histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(classifier)
            .cloned()
    }

    /// Frozen view of the tally.
    pub fn summary(&self) -> ErrorSummary {
        let responses = Response::ALL
            .into_iter()
            .map(|r| (r, self.responses(r)))
            .filter(|(_, n)| *n > 0)
            .collect();
        let counters = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let histograms = self
            .histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, h)| (k.clone(), h.count()))
            .collect();
        ErrorSummary {
            responses,
            counters,
            histograms,
        }
    }

    fn counter(&self, classifier: &str) -> Arc<AtomicU64> {
        if let Some(c) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(classifier)
        {
            return Arc::clone(c);
        }
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(classifier.to_owned())
            .or_default()
            .clone()
    }

    fn histogram(&self, classifier: &str) -> Arc<LatencyHistogram> {
        if let Some(h) = self
            .histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(classifier)
        {
            return Arc::clone(h);
        }
        self.histograms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(classifier.to_owned())
            .or_default()
            .clone()
    }
}

/// Snapshot of an [`ErrorTally`], ordered for stable output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorSummary {
    /// Failures per response (only non-zero entries).
    pub responses: BTreeMap<Response, u64>,
    /// Per-classifier counts under `count`.
    pub counters: BTreeMap<String, u64>,
    /// Per-classifier observation counts under `histogram`.
    pub histograms: BTreeMap<String, u64>,
}

impl ErrorSummary {
    /// Total failures handled.
    pub fn total(&self) -> u64 {
        self.responses.values().sum()
    }
}
