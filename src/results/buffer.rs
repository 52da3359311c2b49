//! # Per-motor result buffer.
//!
//! Collects `(cycle, result)` pairs into a preallocated packed buffer. When `capacity`
//! entries have been appended the buffer flips into a [`ResultSegment`] which goes to the
//! attached [`Sink`], or back to the caller when there is none.
//!
//! ```text
//! append ─► [ e0 e1 .. e(cap-1) ] full ─► ResultSegment ─┬─► sink.on_segment
//!                                                        └─► returned (no sink)
//! ```
//!
//! One producer per buffer; the type is deliberately not `Sync`.

use std::sync::Arc;

use super::segment::{ENTRY_BYTES, ResultSegment, encode};
use super::sink::Sink;
use crate::cycles::IntervalAware;
use crate::error::ConfigError;

/// Fixed-capacity append buffer for cycle results.
pub struct ResultBuffer {
    capacity: usize,
    bytes: Vec<u8>,
    sink: Option<Arc<dyn Sink>>,
}

impl ResultBuffer {
    /// Creates a buffer that hands full segments back to the caller.
    ///
    /// # Errors
    /// [`ConfigError::ZeroCapacity`] when `capacity` is zero.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::ResultBuffer;
    ///
    /// let mut buf = ResultBuffer::new(2).unwrap();
    /// assert!(buf.append(10, 0).is_none());
    /// let seg = buf.append(11, 1).unwrap();
    /// assert_eq!(seg.iter().map(|r| r.cycle).collect::<Vec<_>>(), vec![10, 11]);
    /// ```
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            bytes: Vec::with_capacity(capacity * ENTRY_BYTES),
            sink: None,
        })
    }

    /// Creates a buffer that delivers full segments to `sink`.
    ///
    /// # Errors
    /// [`ConfigError::ZeroCapacity`] when `capacity` is zero.
    pub fn with_sink(capacity: usize, sink: Arc<dyn Sink>) -> Result<Self, ConfigError> {
        let mut buf = Self::new(capacity)?;
        buf.sink = Some(sink);
        Ok(buf)
    }

    /// Entries per segment.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries currently buffered.
    pub fn len(&self) -> usize {
        self.bytes.len() / ENTRY_BYTES
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends one result.
    ///
    /// Returns the completed segment when this append filled the buffer and no sink is
    /// attached.
    pub fn append(&mut self, cycle: u64, result: i8) -> Option<ResultSegment> {
        encode(&mut self.bytes, cycle, result);
        if self.len() < self.capacity {
            return None;
        }
        self.emit()
    }

    /// Flushes a partially filled buffer.
    ///
    /// Returns `None` if the buffer is empty or the segment went to the sink.
    pub fn flush(&mut self) -> Option<ResultSegment> {
        if self.is_empty() {
            return None;
        }
        self.emit()
    }

    fn emit(&mut self) -> Option<ResultSegment> {
        let packed = std::mem::replace(
            &mut self.bytes,
            Vec::with_capacity(self.capacity * ENTRY_BYTES),
        );
        let segment = ResultSegment::from_packed(packed);
        match &self.sink {
            Some(sink) => {
                sink.on_segment(segment);
                None
            }
            None => Some(segment),
        }
    }
}

impl IntervalAware for ResultBuffer {
    fn on_interval(&mut self, _start: u64, count: u64) {
        let room = self.capacity - self.len();
        let wanted = usize::try_from(count).unwrap_or(usize::MAX).min(room);
        self.bytes.reserve(wanted * ENTRY_BYTES);
    }
}
