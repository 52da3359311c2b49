//! # Result sinks.
//!
//! A [`Sink`] receives every [`ResultSegment`] an activity produces, plus checkpoint
//! notifications when progress tracking is enabled. Calls come from motor tasks and must not
//! block; hand heavy work off to a channel.
//!
//! - [`ChannelSink`] forwards segments into an unbounded tokio channel.
//! - [`CollectingSink`] keeps everything in memory (handy in tests).

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use super::segment::{CycleResult, ResultSegment};

/// Receiver of result segments.
pub trait Sink: Send + Sync + 'static {
    /// Called once per flushed segment.
    fn on_segment(&self, segment: ResultSegment);

    /// Called when the pool-wide checkpoint advances.
    fn on_checkpoint(&self, _checkpoint: u64) {}
}

/// Forwards segments to an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ResultSegment>,
}

impl ChannelSink {
    /// Creates the sink and the receiving half of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResultSegment>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn on_segment(&self, segment: ResultSegment) {
        if let Err(e) = self.tx.send(segment) {
            tracing::debug!(entries = e.0.len(), "result receiver dropped; segment discarded");
        }
    }
}

/// Keeps every segment and the last checkpoint in memory.
#[derive(Default)]
pub struct CollectingSink {
    segments: Mutex<Vec<ResultSegment>>,
    checkpoint: Mutex<Option<u64>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments received so far, in arrival order.
    pub fn segments(&self) -> Vec<ResultSegment> {
        self.segments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All results received so far, sorted by cycle.
    pub fn results(&self) -> Vec<CycleResult> {
        let segments = self.segments.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = segments.iter().flat_map(ResultSegment::iter).collect();
        out.sort_unstable_by_key(|r| r.cycle);
        out
    }

    /// Last checkpoint reported.
    pub fn checkpoint(&self) -> Option<u64> {
        *self.checkpoint.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink for CollectingSink {
    fn on_segment(&self, segment: ResultSegment) {
        self.segments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(segment);
    }

    fn on_checkpoint(&self, checkpoint: u64) {
        let mut last = self.checkpoint.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(last.map_or(checkpoint, |prev| prev.max(checkpoint)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultBuffer;

    fn flushed(entries: &[(u64, i8)]) -> ResultSegment {
        let mut buf = ResultBuffer::new(entries.len().max(1)).unwrap();
        for (c, r) in entries {
            buf.append(*c, *r);
        }
        buf.flush().unwrap()
    }

    #[tokio::test]
    async fn channel_sink_forwards_segments() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_segment(flushed(&[(1, 0), (2, 0)]));
        let seg = rx.recv().await.unwrap();
        assert_eq!(seg.len(), 2);
    }

    #[test]
    fn channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_segment(flushed(&[(1, 0)]));
    }

    #[test]
    fn collecting_sink_sorts_results_and_keeps_max_checkpoint() {
        let sink = CollectingSink::new();
        sink.on_segment(flushed(&[(5, 0), (6, 1)]));
        sink.on_segment(flushed(&[(1, 2)]));
        let cycles: Vec<_> = sink.results().iter().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![1, 5, 6]);

        sink.on_checkpoint(9);
        sink.on_checkpoint(4);
        assert_eq!(sink.checkpoint(), Some(9));
    }
}
