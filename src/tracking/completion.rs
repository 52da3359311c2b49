//! # Lock-free completion tracker.
//!
//! Marks cycles of one window `[base, base + len)` as completed, in any order and from any
//! number of threads, and answers how far the contiguous completed prefix reaches.
//!
//! ## Marking
//! ```text
//! set_position(c):
//!   (bucket, bit) = locate(c - base)
//!   loop {                                  // CAS on the inner word
//!     old = inner[bucket]; new = old | bit
//!     old == new      ─► already marked, return false
//!     CAS ok          ─► break
//!   }
//!   new == full       ─► set bucket bit in the outer summary
//! ```
//!
//! ## Rules
//! - Marks are never cleared; `lowest_completed` only moves up.
//! - `is_completed` is true iff the outer summary is full.
//! - The value reported by `lowest_completed` is always a lower bound: every cycle below
//!   it has been marked.

use std::sync::atomic::{AtomicU64, Ordering};

use super::shape::WindowShape;
use crate::error::ConfigError;

/// Completion bitmap for one window, shareable between motors.
#[derive(Debug)]
pub struct CompletionTracker {
    shape: WindowShape,
    base: u64,
    len: u64,
    inner: Box<[AtomicU64]>,
    outer: Box<[AtomicU64]>,
}

impl CompletionTracker {
    /// Creates a tracker for the full window `[base, base + shape.size())`.
    pub fn new(shape: WindowShape, base: u64) -> Self {
        Self::with_len(shape, base, shape.size())
    }

    /// Creates a tracker for `[base, base + len)`, with `len` capped at the window size.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::{CompletionTracker, WindowShape};
    ///
    /// let tracker = CompletionTracker::with_len(WindowShape::new(64, 8).unwrap(), 100, 3);
    /// tracker.set_position(100);
    /// tracker.set_position(102);
    /// assert_eq!(tracker.lowest_completed(), 101);
    /// tracker.set_position(101);
    /// assert!(tracker.is_completed());
    /// ```
    pub fn with_len(shape: WindowShape, base: u64, len: u64) -> Self {
        let len = len.min(shape.size());
        let (inner, outer) = shape.initial_words(len);
        Self {
            shape,
            base,
            len,
            inner: inner.into_iter().map(AtomicU64::new).collect(),
            outer: outer.into_iter().map(AtomicU64::new).collect(),
        }
    }

    /// First cycle of the window.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Exclusive end of the tracked positions.
    #[inline]
    pub fn end(&self) -> u64 {
        self.base + self.len
    }

    /// Window geometry.
    #[inline]
    pub fn shape(&self) -> WindowShape {
        self.shape
    }

    /// Marks `cycle` completed. Returns `false` if it was already marked.
    ///
    /// Hot path: the cycle is not bounds-checked against `len`.
    ///
    /// # Panics
    /// When `cycle` lies before `base` or at/after `base + size`.
    pub fn set_position(&self, cycle: u64) -> bool {
        let (bucket, bit) = self.shape.locate(cycle - self.base);
        let word = &self.inner[bucket];
        let flag = 1u64 << bit;

        let mut old = word.load(Ordering::Acquire);
        let new = loop {
            let new = old | flag;
            if new == old {
                return false;
            }
            match word.compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break new,
                Err(seen) => old = seen,
            }
        };

        if new == self.shape.full_bucket() {
            self.outer[bucket / 64].fetch_or(1 << (bucket % 64), Ordering::AcqRel);
        }
        true
    }

    /// Bounds-checked [`set_position`](Self::set_position).
    ///
    /// # Errors
    /// [`ConfigError::OutOfWindow`] when `cycle` is outside `[base, base + len)`.
    pub fn set_position_checked(&self, cycle: u64) -> Result<bool, ConfigError> {
        self.check(cycle)?;
        Ok(self.set_position(cycle))
    }

    /// True if `cycle` has been marked. Cycles outside the window report `false`.
    pub fn is_set(&self, cycle: u64) -> bool {
        if self.check(cycle).is_err() {
            return false;
        }
        let (bucket, bit) = self.shape.locate(cycle - self.base);
        self.inner[bucket].load(Ordering::Acquire) & (1 << bit) != 0
    }

    /// True once every position of the window has been marked.
    pub fn is_completed(&self) -> bool {
        self.outer
            .iter()
            .enumerate()
            .all(|(i, w)| w.load(Ordering::Acquire) == self.shape.full_outer(i))
    }

    /// Exclusive watermark of the contiguous completed prefix.
    ///
    /// Every cycle in `[base, lowest_completed())` is marked; the returned cycle itself is
    /// not (unless it equals [`end`](Self::end), i.e. the window is complete).
    pub fn lowest_completed(&self) -> u64 {
        let offset = self.shape.lowest_unset(
            |w| self.outer[w].load(Ordering::Acquire),
            |b| self.inner[b].load(Ordering::Acquire),
        );
        self.base + offset.min(self.len)
    }

    fn check(&self, cycle: u64) -> Result<(), ConfigError> {
        if cycle < self.base || cycle - self.base >= self.len {
            return Err(ConfigError::OutOfWindow {
                cycle,
                base: self.base,
                end: self.end(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn completes_only_after_last_position() {
        let tracker = CompletionTracker::new(WindowShape::default(), 0);
        for c in 0..1023 {
            tracker.set_position(c);
        }
        assert!(!tracker.is_completed());
        assert_eq!(tracker.lowest_completed(), 1023);

        tracker.set_position(1023);
        assert!(tracker.is_completed());
        assert_eq!(tracker.lowest_completed(), 1024);
    }

    #[test]
    fn lowest_completed_stops_at_first_gap() {
        let tracker = CompletionTracker::new(WindowShape::new(256, 32).unwrap(), 1000);
        for c in (1000..1100).filter(|c| *c != 1070) {
            tracker.set_position(c);
        }
        assert_eq!(tracker.lowest_completed(), 1070);
        assert!(!tracker.is_set(1070));
        assert!(tracker.is_set(1071));
    }

    #[test]
    fn duplicate_marks_are_reported() {
        let tracker = CompletionTracker::new(WindowShape::default(), 0);
        assert!(tracker.set_position(5));
        assert!(!tracker.set_position(5));
    }

    #[test]
    fn checked_mark_rejects_out_of_window() {
        let tracker = CompletionTracker::with_len(WindowShape::default(), 100, 10);
        assert!(tracker.set_position_checked(99).is_err());
        let err = tracker.set_position_checked(110).unwrap_err();
        assert_eq!(err.as_label(), "config_out_of_window");
        assert!(tracker.set_position_checked(109).unwrap());
    }

    #[test]
    fn watermark_is_monotonic_under_reverse_marking() {
        let tracker = CompletionTracker::new(WindowShape::new(128, 16).unwrap(), 0);
        let mut last = tracker.lowest_completed();
        for c in (0..128).rev() {
            tracker.set_position(c);
            let now = tracker.lowest_completed();
            assert!(now >= last);
            for below in 0..now {
                assert!(tracker.is_set(below));
            }
            last = now;
        }
        assert_eq!(last, 128);
    }

    #[test]
    fn concurrent_marks_complete_window() {
        let tracker = Arc::new(CompletionTracker::new(WindowShape::new(4096, 64).unwrap(), 0));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for c in (t..4096).step_by(4) {
                        tracker.set_position(c);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(tracker.is_completed());
        assert_eq!(tracker.lowest_completed(), 4096);
    }
}
