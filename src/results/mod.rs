//! # Result recording.
//!
//! Motors append one [`CycleResult`] per finished cycle to their own [`ResultBuffer`].
//! Full buffers become read-only [`ResultSegment`]s which are delivered to a [`Sink`].

mod buffer;
mod segment;
mod sink;

pub use buffer::ResultBuffer;
pub use segment::{CycleResult, IntoIter, Iter, ResultSegment};
pub use sink::{ChannelSink, CollectingSink, Sink};
