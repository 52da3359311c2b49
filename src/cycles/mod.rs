//! # Cycle allocation.
//!
//! A cycle is a `u64` ordinal naming one unit of work. Activities run over a
//! half-open [`CycleRange`]; motors claim contiguous [`CycleSegment`]s from a
//! [`CycleSource`].
//!
//! - [`AtomicCycleSource`]: one shared cursor advanced by CAS (work stealing, no order
//!   between motors).
//! - [`StripedCycleSource`]: the range pre-sliced into one contiguous stripe per motor
//!   (no runtime contention).

mod range;
mod source;

pub use range::{CycleRange, CycleSegment};
pub use source::{AtomicCycleSource, CycleSource, IntervalAware, SourceMode, StripedCycleSource};
