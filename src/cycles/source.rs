//! # Cycle sources.
//!
//! A [`CycleSource`] hands out contiguous [`CycleSegment`]s until its range (and
//! every configured replay of it) is exhausted.
//!
//! ## Claim protocol
//! ```text
//! loop {
//!   cur  = cursor.load()                     // position across all replays
//!   if cur >= len * recycles ─► None
//!   next = min(cur + stride, end of current replay)
//!   CAS(cursor, cur, next) ─► Ok: return [cur, next) mapped into the range
//!                          └► Err: another motor won, retry
//! }
//! ```
//!
//! ## Rules
//! - Every cycle of every recycle is handed out **exactly once**.
//! - Segments never cross the range end; the final segment may be shorter than `stride`.
//! - No ordering is promised between motors sharing one source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::range::{CycleRange, CycleSegment};

/// Producer of cycle segments.
pub trait CycleSource: Send + Sync + 'static {
    /// Claims up to `stride` contiguous cycles, or `None` once exhausted.
    fn claim(&self, stride: u64) -> Option<CycleSegment>;

    /// Claims a single cycle.
    fn next(&self) -> Option<u64> {
        self.claim(1).map(|seg| seg.start)
    }

    /// The range this source walks.
    fn range(&self) -> CycleRange;
}

/// Consumers notified of an interval before its cycles are dispatched.
///
/// Lets a consumer pre-size storage for `count` cycles starting at `start`.
pub trait IntervalAware {
    /// Called once per claimed segment, before its first cycle runs.
    fn on_interval(&mut self, start: u64, count: u64);
}

/// How the activity distributes its range over motors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceMode {
    /// All motors share one atomic cursor (default).
    #[default]
    Shared,
    /// Each motor walks its own pre-sliced stripe.
    Striped,
}

/// Shared atomic cursor over a range, with optional replays.
///
/// The cursor counts claimed positions across all replays (`0..len * recycles`), so
/// a single CAS both claims cycles and moves between replays.
#[derive(Debug)]
pub struct AtomicCycleSource {
    start: u64,
    end: u64,
    cursor: AtomicU64,
    recycles: u64,
}

impl AtomicCycleSource {
    /// Creates a source that walks `range` once.
    pub fn new(range: CycleRange) -> Self {
        Self::with_recycles(range, 1)
    }

    /// Creates a source that walks `range` `recycles` times (min 1).
    pub fn with_recycles(range: CycleRange, recycles: u64) -> Self {
        Self {
            start: range.start(),
            end: range.end(),
            cursor: AtomicU64::new(0),
            recycles: recycles.max(1),
        }
    }

    /// Number of positions claimed so far, across all replays.
    pub fn claimed(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline]
    fn len(&self) -> u64 {
        self.end - self.start
    }
}

impl CycleSource for AtomicCycleSource {
    fn claim(&self, stride: u64) -> Option<CycleSegment> {
        let stride = stride.max(1);
        loop {
            let len = self.len();
            if len == 0 {
                return None;
            }
            let total = len.saturating_mul(self.recycles);
            let cur = self.cursor.load(Ordering::Acquire);
            if cur >= total {
                return None;
            }

            let recycle = cur / len;
            let pass_end = (recycle + 1).saturating_mul(len).min(total);
            let next = cur.saturating_add(stride).min(pass_end);
            if self
                .cursor
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let first = self.start + (cur - recycle * len);
                return Some(CycleSegment::new(recycle, first, first + (next - cur)));
            }
        }
    }

    fn range(&self) -> CycleRange {
        CycleRange::from_bounds(self.start, self.end)
    }
}

/// A range pre-sliced into one independent source per motor.
pub struct StripedCycleSource {
    range: CycleRange,
    stripes: Vec<Arc<AtomicCycleSource>>,
}

impl StripedCycleSource {
    /// Slices `range` into `motors` contiguous stripes.
    pub fn new(range: CycleRange, motors: usize, recycles: u64) -> Self {
        let stripes = range
            .stripes(motors)
            .into_iter()
            .map(|r| Arc::new(AtomicCycleSource::with_recycles(r, recycles)))
            .collect();
        Self { range, stripes }
    }

    /// Source for motor `idx` (wraps around if `idx >= motors`).
    pub fn stripe(&self, idx: usize) -> Arc<dyn CycleSource> {
        let s = &self.stripes[idx % self.stripes.len()];
        Arc::clone(s) as Arc<dyn CycleSource>
    }

    /// Number of stripes.
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    /// True if there are no stripes.
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// The full range covered by all stripes.
    pub fn range(&self) -> CycleRange {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn range(start: u64, end: u64) -> CycleRange {
        CycleRange::new(start, end).unwrap()
    }

    #[test]
    fn next_walks_range_then_exhausts() {
        let src = AtomicCycleSource::new(range(3, 6));
        assert_eq!(src.next(), Some(3));
        assert_eq!(src.next(), Some(4));
        assert_eq!(src.next(), Some(5));
        assert_eq!(src.next(), None);
        assert_eq!(src.next(), None);
    }

    #[test]
    fn claim_truncates_last_segment() {
        let src = AtomicCycleSource::new(range(0, 10));
        assert_eq!(src.claim(4), Some(CycleSegment::new(0, 0, 4)));
        assert_eq!(src.claim(4), Some(CycleSegment::new(0, 4, 8)));
        assert_eq!(src.claim(4), Some(CycleSegment::new(0, 8, 10)));
        assert_eq!(src.claim(4), None);
    }

    #[test]
    fn recycles_replay_the_range() {
        let src = AtomicCycleSource::with_recycles(range(0, 2), 3);
        let got: Vec<_> = std::iter::from_fn(|| src.claim(1))
            .map(|s| (s.recycle, s.start))
            .collect();
        assert_eq!(got, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn concurrent_claims_are_exactly_once() {
        let src = Arc::new(AtomicCycleSource::new(range(0, 10_000)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let src = Arc::clone(&src);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(seg) = src.claim(7) {
                        seen.extend(seg);
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        let mut total = 0;
        for h in handles {
            let seen = h.join().unwrap();
            total += seen.len();
            all.extend(seen);
        }
        assert_eq!(total, 10_000);
        assert_eq!(all.len(), 10_000);
    }

    #[test]
    fn striped_sources_are_disjoint() {
        let striped = StripedCycleSource::new(range(0, 9), 3, 1);
        let a: Vec<_> = std::iter::from_fn(|| striped.stripe(0).next()).collect();
        let c: Vec<_> = std::iter::from_fn(|| striped.stripe(2).next()).collect();
        assert_eq!(a, vec![0, 1, 2]);
        assert_eq!(c, vec![6, 7, 8]);
    }
}
