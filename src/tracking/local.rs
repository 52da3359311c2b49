//! # Single-owner completion tracker.
//!
//! Same bitmap as [`CompletionTracker`](super::CompletionTracker) with plain words.
//! A motor owns one and resets it for every claimed segment.

use super::shape::WindowShape;
use crate::error::ConfigError;

/// Non-atomic completion bitmap for one window.
#[derive(Debug, Clone)]
pub struct LocalCompletionTracker {
    shape: WindowShape,
    base: u64,
    len: u64,
    inner: Vec<u64>,
    outer: Vec<u64>,
}

impl LocalCompletionTracker {
    /// Creates a tracker for the full window `[base, base + shape.size())`.
    pub fn new(shape: WindowShape, base: u64) -> Self {
        let (inner, outer) = shape.initial_words(shape.size());
        Self {
            shape,
            base,
            len: shape.size(),
            inner,
            outer,
        }
    }

    /// Clears all marks and re-targets the tracker at `[base, base + len)`.
    ///
    /// Storage is reused; `len` is capped at the window size.
    pub fn reset(&mut self, base: u64, len: u64) {
        let len = len.min(self.shape.size());
        let (inner, outer) = self.shape.initial_words(len);
        self.inner.copy_from_slice(&inner);
        self.outer.copy_from_slice(&outer);
        self.base = base;
        self.len = len;
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

    /// Marks `cycle` completed. Returns `false` if it was already marked.
    ///
    /// # Panics
    /// When `cycle` lies before `base` or at/after `base + size`.
    pub fn set_position(&mut self, cycle: u64) -> bool {
        let (bucket, bit) = self.shape.locate(cycle - self.base);
        let old = self.inner[bucket];
        let new = old | (1 << bit);
        if new == old {
            return false;
        }
        self.inner[bucket] = new;
        if new == self.shape.full_bucket() {
            self.outer[bucket / 64] |= 1 << (bucket % 64);
        }
        true
    }

    /// Bounds-checked [`set_position`](Self::set_position).
    ///
    /// # Errors
    /// [`ConfigError::OutOfWindow`] when `cycle` is outside `[base, base + len)`.
    pub fn set_position_checked(&mut self, cycle: u64) -> Result<bool, ConfigError> {
        if cycle < self.base || cycle - self.base >= self.len {
            return Err(ConfigError::OutOfWindow {
                cycle,
                base: self.base,
                end: self.end(),
            });
        }
        Ok(self.set_position(cycle))
    }

    /// True if `cycle` has been marked.
    pub fn is_set(&self, cycle: u64) -> bool {
        if cycle < self.base || cycle - self.base >= self.len {
            return false;
        }
        let (bucket, bit) = self.shape.locate(cycle - self.base);
        self.inner[bucket] & (1 << bit) != 0
    }

    /// True once every position of the window has been marked.
    pub fn is_completed(&self) -> bool {
        self.outer
            .iter()
            .enumerate()
            .all(|(i, w)| *w == self.shape.full_outer(i))
    }

    /// Exclusive watermark of the contiguous completed prefix.
    pub fn lowest_completed(&self) -> u64 {
        let offset = self
            .shape
            .lowest_unset(|w| self.outer[w], |b| self.inner[b]);
        self.base + offset.min(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_after_1024_marks() {
        let mut tracker = LocalCompletionTracker::new(WindowShape::default(), 0);
        for c in 0..1023 {
            tracker.set_position(c);
        }
        assert!(!tracker.is_completed());
        tracker.set_position(1023);
        assert!(tracker.is_completed());
    }

    #[test]
    fn reset_retargets_and_clears() {
        let mut tracker = LocalCompletionTracker::new(WindowShape::new(64, 8).unwrap(), 0);
        for c in 0..64 {
            tracker.set_position(c);
        }
        assert!(tracker.is_completed());

        tracker.reset(500, 5);
        assert!(!tracker.is_completed());
        assert!(!tracker.is_set(500));
        assert_eq!(tracker.lowest_completed(), 500);
        for c in [503, 501, 504, 500] {
            tracker.set_position(c);
        }
        assert_eq!(tracker.lowest_completed(), 502);
        tracker.set_position(502);
        assert!(tracker.is_completed());
        assert_eq!(tracker.lowest_completed(), 505);
    }

    #[test]
    fn checked_mark_respects_short_window() {
        let mut tracker = LocalCompletionTracker::new(WindowShape::new(64, 8).unwrap(), 0);
        tracker.reset(10, 2);
        assert!(tracker.set_position_checked(11).is_ok());
        assert!(tracker.set_position_checked(12).is_err());
    }
}
