//! # Cycle ranges and claimed segments.

use std::ops::Range;

use crate::error::ConfigError;

/// Half-open interval of cycles `[start, end)`.
///
/// Construction fails fast when `start > end`; an empty range is valid and
/// simply produces no work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CycleRange {
    start: u64,
    end: u64,
}

impl CycleRange {
    /// Creates a range, rejecting `start > end`.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::CycleRange;
    ///
    /// let range = CycleRange::new(10, 20).unwrap();
    /// assert_eq!(range.len(), 10);
    /// assert!(CycleRange::new(20, 10).is_err());
    /// ```
    pub fn new(start: u64, end: u64) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds a range from bounds already known to be ordered.
    pub(crate) fn from_bounds(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Inclusive start.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end.
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of cycles in the range.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True if the range holds no cycles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `cycle` lies inside the range.
    #[inline]
    pub fn contains(&self, cycle: u64) -> bool {
        self.start <= cycle && cycle < self.end
    }

    /// Splits the range into `parts` contiguous stripes of near-equal length.
    ///
    /// The first `len % parts` stripes receive one extra cycle. Stripes may be
    /// empty when `parts > len`.
    pub fn stripes(&self, parts: usize) -> Vec<CycleRange> {
        let parts = parts.max(1) as u64;
        let base = self.len() / parts;
        let extra = self.len() % parts;

        let mut out = Vec::with_capacity(parts as usize);
        let mut cursor = self.start;
        for i in 0..parts {
            let len = base + u64::from(i < extra);
            out.push(CycleRange {
                start: cursor,
                end: cursor + len,
            });
            cursor += len;
        }
        out
    }
}

impl From<CycleRange> for Range<u64> {
    fn from(r: CycleRange) -> Self {
        r.start..r.end
    }
}

/// A contiguous run of cycles claimed by one motor.
///
/// Iterating the segment yields its cycles in ascending order. `recycle` is the
/// replay index of the source range this segment was cut from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleSegment {
    /// Replay index (0 for the first pass).
    pub recycle: u64,
    /// Inclusive first cycle.
    pub start: u64,
    /// Exclusive end.
    pub end: u64,
}

impl CycleSegment {
    /// Creates a segment covering `[start, end)` in replay `recycle`.
    pub fn new(recycle: u64, start: u64, end: u64) -> Self {
        Self {
            recycle,
            start,
            end,
        }
    }

    /// Number of cycles in the segment.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True if the segment is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the cycles of the segment.
    pub fn cycles(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl IntoIterator for CycleSegment {
    type Item = u64;
    type IntoIter = Range<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.cycles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        let err = CycleRange::new(5, 4).unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_range");
    }

    #[test]
    fn empty_range_is_valid() {
        let r = CycleRange::new(7, 7).unwrap();
        assert!(r.is_empty());
        assert!(!r.contains(7));
    }

    #[test]
    fn stripes_partition_the_range() {
        let r = CycleRange::new(100, 110).unwrap();
        let stripes = r.stripes(3);
        assert_eq!(stripes.len(), 3);
        assert_eq!((stripes[0].start(), stripes[0].end()), (100, 104));
        assert_eq!((stripes[1].start(), stripes[1].end()), (104, 107));
        assert_eq!((stripes[2].start(), stripes[2].end()), (107, 110));
        assert_eq!(stripes.iter().map(CycleRange::len).sum::<u64>(), r.len());
    }

    #[test]
    fn more_stripes_than_cycles_yields_empty_tail() {
        let r = CycleRange::new(0, 2).unwrap();
        let stripes = r.stripes(4);
        assert_eq!(stripes.iter().filter(|s| s.is_empty()).count(), 2);
    }

    #[test]
    fn segment_iterates_in_order() {
        let seg = CycleSegment::new(0, 3, 6);
        assert_eq!(seg.into_iter().collect::<Vec<_>>(), vec![3, 4, 5]);
    }
}
