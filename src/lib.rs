//! # cyclemotor
//!
//! **cyclemotor** is a cycle-driven workload execution core for Rust.
//! It dispatches a monotonically increasing `u64` *cycle* to a pluggable operation across a
//! pool of concurrent workers (*motors*), tracks completion and results per cycle, and
//! resolves failures through a severity-ordered error policy.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            ┌──────────────────────────────────────────────────────────┐
//!            │  Activity (controller)                                   │
//!            │  - CycleSource (shared cursor | striped)                 │
//!            │  - ErrorPolicy (classifier → response, metrics)          │
//!            │  - RunStateTally (pool-wide counts, deadline awaits)     │
//!            │  - CheckpointLedger (optional) / SequenceBarrier (opt.)  │
//!            │  - Bus ──► SubscriberSet ──► LogWriter, custom, ...      │
//!            └──────┬──────────────────┬──────────────────┬─────────────┘
//!                   ▼                  ▼                  ▼
//!            ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!            │   Motor 0   │    │   Motor 1   │    │   Motor N   │
//!            │ tracker     │    │ tracker     │    │ tracker     │
//!            │ buffer      │    │ buffer      │    │ buffer      │
//!            └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!                   └──── ResultSegment ───► Sink ◄───────┘
//! ```
//!
//! ### Motor lifecycle
//! ```text
//! Starting ─► Running ─┬─► Finished            (source exhausted)
//!     │                ├─► Stopping ─► Stopped (stop requested; claimed segment finished)
//!     │                └─► Errored             (policy resolved a failure to `stop`)
//!     └─► Stopping                              (stop requested before the first claim)
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                          |
//! |-----------------|----------------------------------------------------------|----------------------------------------------------|
//! | **Controller**  | Build, run and stop a pool of motors.                    | [`Activity`], [`ActivityBuilder`], [`ActivityConfig`] |
//! | **Cycles**      | Ranges, segments and claim sources.                      | [`CycleRange`], [`AtomicCycleSource`], [`StripedCycleSource`] |
//! | **Tracking**    | Completion bitmaps, checkpoints, range-ordered gate.     | [`CompletionTracker`], [`CheckpointLedger`], [`SequenceBarrier`] |
//! | **Policies**    | Failure classification, retries, metrics.                | [`ErrorPolicy`], [`Response`], [`RetryBackoff`]    |
//! | **Results**     | Per-motor buffering and delivery.                        | [`ResultBuffer`], [`ResultSegment`], [`Sink`]      |
//! | **Run state**   | Motor lifecycle and pool snapshots.                      | [`RunState`], [`RunStateTally`], [`RunStateSnapshot`] |
//! | **Operations**  | The cycle → work boundary.                               | [`Operation`], [`OpFn`]                            |
//! | **Events**      | Observability through subscribers.                       | [`Event`], [`Subscribe`], [`LogWriter`]            |
//! | **Errors**      | Typed configuration, operation and runtime errors.       | [`ConfigError`], [`OperationFailure`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cyclemotor::{ActivityBuilder, ActivityConfig, CollectingSink, OpFn, OperationFailure, RunState};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ActivityConfig::for_range(0, 1_000);
//!     cfg.motors = 4;
//!     cfg.stride = 16;
//!     cfg.errors = "Overloaded:retry,count;stop".into();
//!     cfg.handle_signals = false;
//!
//!     let op = OpFn::arc("echo", |cycle: u64| async move {
//!         Ok::<i8, OperationFailure>((cycle % 7) as i8)
//!     });
//!     let sink = Arc::new(CollectingSink::new());
//!
//!     let activity = ActivityBuilder::new(cfg, op).with_sink(sink.clone()).build()?;
//!     let report = activity.run().await?;
//!
//!     assert!(report.snapshot.is_only(RunState::Finished));
//!     assert_eq!(report.cycles(), 1_000);
//!     assert_eq!(report.checkpoint, Some(999));
//!     assert_eq!(sink.results().len(), 1_000);
//!     Ok(())
//! }
//! ```

mod core;
mod cycles;
mod error;
mod events;
mod ops;
mod policies;
mod results;
mod state;
mod subscribers;
mod tracking;

// ---- Public re-exports ----

pub use core::{Activity, ActivityBuilder, ActivityConfig, ActivityReport, MotorReport};
pub use cycles::{
    AtomicCycleSource, CycleRange, CycleSegment, CycleSource, IntervalAware, SourceMode,
    StripedCycleSource,
};
pub use error::{ConfigError, OperationFailure, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use ops::{BoxOpFuture, OpFn, Operation, OperationRef};
pub use policies::{
    DEFAULT_FAILURE_CODE, DEFAULT_MAX_TRIES, ErrorPolicy, ErrorRule, ErrorSummary, ErrorTally,
    LatencyHistogram, Response, RetryBackoff, Verdict,
};
pub use results::{
    ChannelSink, CollectingSink, CycleResult, IntoIter, Iter, ResultBuffer, ResultSegment, Sink,
};
pub use state::{MotorSlot, RunState, RunStateSnapshot, RunStateTally};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tracking::{
    CheckpointLedger, CompletionTracker, LocalCompletionTracker, SequenceBarrier, WindowShape,
};
