//! # Completion tracking and ordering.
//!
//! - [`WindowShape`]: geometry of a two-level completion bitmap (`N = B * W`).
//! - [`CompletionTracker`]: lock-free bitmap for one window, marked from any thread.
//! - [`LocalCompletionTracker`]: the same bitmap for a single owner; motors keep one per
//!   claimed segment.
//! - [`CheckpointLedger`]: chain of shared windows over a whole range yielding the lowest
//!   safe checkpoint.
//! - [`SequenceBarrier`]: runs actions keyed by half-open ranges in ascending order.

mod barrier;
mod completion;
mod ledger;
mod local;
mod shape;

pub use barrier::SequenceBarrier;
pub use completion::CompletionTracker;
pub use ledger::CheckpointLedger;
pub use local::LocalCompletionTracker;
pub use shape::WindowShape;
