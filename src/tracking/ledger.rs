//! # Pool-wide checkpoint ledger.
//!
//! A chain of shared [`CompletionTracker`] windows covering the activity range. Motors mark
//! cycles as they complete; windows are appended on demand and retired from the front once
//! full, so only the in-flight span is held in memory.
//!
//! ```text
//!  retired ─┐   front                          back
//!           ▼   ┌──────────┐┌──────────┐┌──────────┐
//!  [start ..)   │ window 0 ││ window 1 ││ window 2 │ ..extended on demand
//!               └──────────┘└──────────┘└──────────┘
//!  checkpoint = front.lowest_completed() - 1
//! ```
//!
//! ## Rules
//! - Windows are retired strictly in order; a full window behind an incomplete one stays.
//! - The checkpoint never moves backwards.
//! - Marks for cycles in already retired windows are ignored.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::completion::CompletionTracker;
use super::shape::WindowShape;
use crate::cycles::CycleRange;

/// Shared completion record for a whole activity range.
pub struct CheckpointLedger {
    shape: WindowShape,
    range: CycleRange,
    windows: RwLock<VecDeque<Arc<CompletionTracker>>>,
    retired: AtomicU64,
}

impl CheckpointLedger {
    /// Creates a ledger for `range` using windows of `shape`.
    pub fn new(shape: WindowShape, range: CycleRange) -> Self {
        Self {
            shape,
            range,
            windows: RwLock::new(VecDeque::new()),
            retired: AtomicU64::new(range.start()),
        }
    }

    /// Range covered by the ledger.
    pub fn range(&self) -> CycleRange {
        self.range
    }

    /// Marks `cycle` completed.
    ///
    /// Returns the new checkpoint when this mark retired one or more windows.
    /// Cycles outside the range are ignored.
    pub fn mark(&self, cycle: u64) -> Option<u64> {
        if !self.range.contains(cycle) {
            return None;
        }
        let window = self.window_for(cycle)?;
        window.set_position(cycle);
        if window.is_completed() {
            self.retire()
        } else {
            None
        }
    }

    /// Highest cycle `c` such that every cycle in `[start, c]` has completed, or `None`
    /// while the first cycle is still open.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::{CheckpointLedger, CycleRange, WindowShape};
    ///
    /// let ledger = CheckpointLedger::new(WindowShape::new(8, 4).unwrap(), CycleRange::new(0, 20).unwrap());
    /// for c in [0, 1, 2, 4] {
    ///     ledger.mark(c);
    /// }
    /// assert_eq!(ledger.checkpoint(), Some(2));
    /// ```
    pub fn checkpoint(&self) -> Option<u64> {
        let watermark = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .front()
            .map(|w| w.lowest_completed())
            .unwrap_or_else(|| self.retired.load(Ordering::Acquire));
        (watermark > self.range.start()).then(|| watermark - 1)
    }

    /// True once every cycle of the range has completed.
    pub fn is_complete(&self) -> bool {
        self.retired.load(Ordering::Acquire) >= self.range.end()
    }

    /// Number of windows currently held.
    pub fn live_windows(&self) -> usize {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn window_for(&self, cycle: u64) -> Option<Arc<CompletionTracker>> {
        {
            let windows = self.windows.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(w) = self.lookup(&windows, cycle) {
                return w;
            }
        }

        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(w) = self.lookup(&windows, cycle) {
                return w;
            }
            let base = windows
                .back()
                .map(|w| w.base() + self.shape.size())
                .unwrap_or_else(|| self.retired.load(Ordering::Acquire));
            let len = (self.range.end() - base).min(self.shape.size());
            windows.push_back(Arc::new(CompletionTracker::with_len(self.shape, base, len)));
        }
    }

    /// `Some(Some(w))` found, `Some(None)` already retired, `None` not yet allocated.
    fn lookup(
        &self,
        windows: &VecDeque<Arc<CompletionTracker>>,
        cycle: u64,
    ) -> Option<Option<Arc<CompletionTracker>>> {
        let front = match windows.front() {
            Some(front) => front.base(),
            None => {
                return (cycle < self.retired.load(Ordering::Acquire)).then_some(None);
            }
        };
        if cycle < front {
            return Some(None);
        }
        let idx = ((cycle - front) / self.shape.size()) as usize;
        windows.get(idx).map(|w| Some(Arc::clone(w)))
    }

    fn retire(&self) -> Option<u64> {
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        let mut moved = false;
        while windows.front().is_some_and(|w| w.is_completed()) {
            if let Some(done) = windows.pop_front() {
                self.retired.store(done.end(), Ordering::Release);
                moved = true;
            }
        }
        drop(windows);
        if moved { self.checkpoint() } else { None }
    }
}
