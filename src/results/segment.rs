//! # Packed cycle results.
//!
//! Each entry is stored as 9 bytes: the cycle as little-endian `u64` followed by the
//! result code.
//!
//! ```text
//! ┌──────── cycle (8, LE) ────────┬ result ┐┌──────── cycle ...
//! │ b0 b1 b2 b3 b4 b5 b6 b7       │   i8   ││
//! └───────────────────────────────┴────────┘└──────────
//! ```

/// One recorded outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CycleResult {
    /// Cycle the result belongs to.
    pub cycle: u64,
    /// Result code; `0` is success, other values are operation or policy defined.
    pub result: i8,
}

impl CycleResult {
    /// Creates a result entry.
    pub fn new(cycle: u64, result: i8) -> Self {
        Self { cycle, result }
    }
}

pub(crate) const ENTRY_BYTES: usize = 9;

/// An immutable, finite run of results in insertion order.
///
/// Produced by [`ResultBuffer`](super::ResultBuffer) once full or flushed. Consuming the
/// segment with `into_iter` walks it once; [`iter`](Self::iter) decodes without consuming.
#[derive(Clone, PartialEq, Eq)]
pub struct ResultSegment {
    bytes: Box<[u8]>,
}

impl ResultSegment {
    pub(crate) fn from_packed(bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len() % ENTRY_BYTES, 0);
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.bytes.len() / ENTRY_BYTES
    }

    /// True if the segment holds no entries.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cycle of the first entry.
    pub fn first_cycle(&self) -> Option<u64> {
        self.iter().next().map(|r| r.cycle)
    }

    /// Cycle of the last entry.
    pub fn last_cycle(&self) -> Option<u64> {
        self.iter().next_back().map(|r| r.cycle)
    }

    /// Decodes the entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            chunks: self.bytes.chunks_exact(ENTRY_BYTES),
        }
    }
}

impl std::fmt::Debug for ResultSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSegment")
            .field("len", &self.len())
            .field("first", &self.first_cycle())
            .field("last", &self.last_cycle())
            .finish()
    }
}

/// Borrowing iterator over a [`ResultSegment`].
pub struct Iter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

fn decode(entry: &[u8]) -> CycleResult {
    let mut cycle = [0u8; 8];
    cycle.copy_from_slice(&entry[..8]);
    CycleResult {
        cycle: u64::from_le_bytes(cycle),
        result: entry[8] as i8,
    }
}

impl Iterator for Iter<'_> {
    type Item = CycleResult;

    fn next(&mut self) -> Option<CycleResult> {
        self.chunks.next().map(decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<CycleResult> {
        self.chunks.next_back().map(decode)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ResultSegment {
    type Item = CycleResult;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning single-pass iterator over a [`ResultSegment`].
pub struct IntoIter {
    bytes: Box<[u8]>,
    pos: usize,
}

impl Iterator for IntoIter {
    type Item = CycleResult;

    fn next(&mut self) -> Option<CycleResult> {
        let entry = self.bytes.get(self.pos..self.pos + ENTRY_BYTES)?;
        self.pos += ENTRY_BYTES;
        Some(decode(entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.bytes.len() - self.pos) / ENTRY_BYTES;
        (left, Some(left))
    }
}

impl ExactSizeIterator for IntoIter {}

impl IntoIterator for ResultSegment {
    type Item = CycleResult;
    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            bytes: self.bytes,
            pos: 0,
        }
    }
}

pub(crate) fn encode(out: &mut Vec<u8>, cycle: u64, result: i8) {
    out.extend_from_slice(&cycle.to_le_bytes());
    out.push(result as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(entries: &[(u64, i8)]) -> ResultSegment {
        let mut bytes = Vec::new();
        for (c, r) in entries {
            encode(&mut bytes, *c, *r);
        }
        ResultSegment::from_packed(bytes)
    }

    #[test]
    fn keeps_insertion_order_and_negative_codes() {
        let seg = segment(&[(u64::MAX, -1), (3, 127), (1, -128)]);
        let got: Vec<_> = seg.iter().map(|r| (r.cycle, r.result)).collect();
        assert_eq!(got, vec![(u64::MAX, -1), (3, 127), (1, -128)]);
        assert_eq!(seg.first_cycle(), Some(u64::MAX));
        assert_eq!(seg.last_cycle(), Some(1));
    }

    #[test]
    fn owned_iteration_is_single_pass() {
        let seg = segment(&[(7, 0), (8, 1)]);
        let mut it = seg.into_iter();
        assert_eq!(it.len(), 2);
        assert_eq!(it.next(), Some(CycleResult::new(7, 0)));
        assert_eq!(it.next(), Some(CycleResult::new(8, 1)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn empty_segment() {
        let seg = segment(&[]);
        assert!(seg.is_empty());
        assert_eq!(seg.first_cycle(), None);
        assert_eq!(seg.iter().count(), 0);
    }
}
