//! # Motor: one worker of an activity.
//!
//! A motor claims segments from its [`CycleSource`], runs each cycle through
//! [`run_cycle`], and records the result in its own completion tracker and result buffer.
//! Once a segment is done, the completed prefix its tracker reports goes to the pool-wide
//! checkpoint ledger; in ordered mode the segment's output then passes the sequence barrier
//! before reaching the sink.
//!
//! ## Loop
//! ```text
//! Starting ─► Running
//! loop {
//!   ├─► stop requested?            → Stopping → Stopped
//!   ├─► source.claim(stride)
//!   │     └─ None                  → Finished
//!   ├─► tracker.reset / buffer.on_interval
//!   ├─► for cycle in segment:
//!   │     ├─► run_cycle()          (attempts, retries, policy)
//!   │     ├─► tracker.set_position, buffer.append
//!   │     └─ Halt                  → finish segment output, then Errored
//!   ├─► first pass: ledger.mark(start .. tracker.lowest_completed)
//!   └─► ordered: barrier.await_and_run(segment) → sink
//! }
//! ```
//!
//! ## Rules
//! - Stop requests are observed between segments; a claimed segment always runs to its end
//!   (or to the cycle that halted the motor).
//! - The motor owns its tracker and buffer; nothing in them is shared.
//! - Only the first pass over the range feeds the checkpoint; replayed cycles never move it.
//! - The motor drives every state transition except the controller's request for `Stopping`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::context::ActivityContext;
use super::runner::{CycleOutcome, run_cycle};
use crate::cycles::{CycleSegment, CycleSource, IntervalAware};
use crate::error::{ConfigError, RuntimeError};
use crate::events::EventKind;
use crate::ops::OperationRef;
use crate::results::{ResultBuffer, ResultSegment};
use crate::state::{MotorSlot, RunState};
use crate::tracking::LocalCompletionTracker;

/// What one motor did during a run.
#[derive(Clone, Debug)]
pub struct MotorReport {
    /// Slot id.
    pub motor: usize,
    /// Final state.
    pub state: RunState,
    /// Segments claimed.
    pub segments: u64,
    /// Cycles that reached a result.
    pub cycles: u64,
    /// Attempts dispatched, retries included.
    pub tries: u64,
    /// Cycles whose result came from the error policy rather than the operation.
    pub failures: u64,
    /// Last cycle that reached a result.
    pub last_cycle: Option<u64>,
    /// Why the motor errored, if it did.
    pub error: Option<RuntimeError>,
}

impl MotorReport {
    pub(crate) fn new(motor: usize) -> Self {
        Self {
            motor,
            state: RunState::Starting,
            segments: 0,
            cycles: 0,
            tries: 0,
            failures: 0,
            last_cycle: None,
            error: None,
        }
    }

    /// Report for a motor whose task panicked.
    pub(crate) fn panicked(motor: usize) -> Self {
        Self {
            state: RunState::Errored,
            error: Some(RuntimeError::MotorPanicked { motor }),
            ..Self::new(motor)
        }
    }
}

enum Exit {
    Finished,
    Stopped,
    Errored(RuntimeError),
}

pub(crate) struct Motor {
    slot: Arc<MotorSlot>,
    source: Arc<dyn CycleSource>,
    op: OperationRef,
    ctx: Arc<ActivityContext>,
    tracker: LocalCompletionTracker,
    buffer: ResultBuffer,
}

impl Motor {
    /// Builds a motor. Output goes straight to the sink unless the activity is ordered.
    pub fn new(
        slot: Arc<MotorSlot>,
        source: Arc<dyn CycleSource>,
        op: OperationRef,
        ctx: Arc<ActivityContext>,
        buffer_capacity: usize,
    ) -> Result<Self, ConfigError> {
        let buffer = match (&ctx.sink, &ctx.barrier) {
            (Some(sink), None) => ResultBuffer::with_sink(buffer_capacity, Arc::clone(sink))?,
            _ => ResultBuffer::new(buffer_capacity)?,
        };
        let tracker = LocalCompletionTracker::new(ctx.shape, source.range().start());
        Ok(Self {
            slot,
            source,
            op,
            ctx,
            tracker,
            buffer,
        })
    }

    pub fn id(&self) -> usize {
        self.slot.id()
    }

    /// Runs until the source is exhausted, a stop is requested, or a cycle halts the motor.
    pub async fn run(mut self, token: CancellationToken) -> MotorReport {
        let id = self.id();
        let mut report = MotorReport::new(id);
        self.ctx.publish(
            self.ctx
                .event(EventKind::MotorStarting)
                .with_motor(id)
                .with_state(RunState::Starting),
        );

        let exit = if self.slot.enter(RunState::Running).is_some() {
            self.ctx.publish(
                self.ctx
                    .event(EventKind::MotorRunning)
                    .with_motor(id)
                    .with_state(RunState::Running),
            );
            self.drive(&token, &mut report).await
        } else {
            Exit::Stopped
        };

        // Unordered output goes to the sink here; without a sink it is dropped.
        if let Some(dropped) = self.buffer.flush() {
            tracing::debug!(motor = id, results = dropped.len(), "no sink; trailing results dropped");
        }
        self.settle(exit, &mut report);
        report
    }

    async fn drive(&mut self, token: &CancellationToken, report: &mut MotorReport) -> Exit {
        let id = self.id();
        loop {
            if token.is_cancelled() || self.slot.is_stopping() {
                return Exit::Stopped;
            }
            let Some(seg) = self.source.claim(self.ctx.stride) else {
                return Exit::Finished;
            };
            report.segments += 1;
            self.tracker.reset(seg.start, seg.len());
            self.buffer.on_interval(seg.start, seg.len());

            let mut out = Vec::new();
            let mut halted = None;
            for cycle in seg.cycles() {
                let outcome = run_cycle(self.op.as_ref(), cycle, id, &self.ctx).await;
                report.tries += u64::from(outcome.tries());
                report.cycles += 1;
                report.last_cycle = Some(cycle);
                self.record(cycle, outcome.result(), &mut out);

                match outcome {
                    CycleOutcome::Done { failed: true, .. } => report.failures += 1,
                    CycleOutcome::Done { .. } => {}
                    CycleOutcome::Halt { failure, .. } => {
                        report.failures += 1;
                        halted = Some(RuntimeError::MotorErrored {
                            motor: id,
                            cycle,
                            error: failure,
                        });
                        break;
                    }
                }
            }

            let completed_to = self.tracker.lowest_completed();
            if completed_to < seg.end {
                tracing::debug!(
                    motor = id,
                    start = seg.start,
                    end = seg.end,
                    completed_to,
                    "segment left incomplete"
                );
            }
            if seg.recycle == 0 {
                self.advance_checkpoint(seg.start, completed_to);
            }
            if let Err(e) = self.deliver_ordered(&seg, out).await {
                tracing::error!(motor = id, error = %e, "ordered delivery failed");
                return Exit::Errored(e.into());
            }
            if let Some(err) = halted {
                return Exit::Errored(err);
            }
        }
    }

    fn record(&mut self, cycle: u64, result: i8, out: &mut Vec<ResultSegment>) {
        if !self.tracker.set_position(cycle) {
            tracing::warn!(motor = self.id(), cycle, "cycle completed twice");
            return;
        }
        if let Some(full) = self.buffer.append(cycle, result) {
            if self.ctx.barrier.is_some() {
                out.push(full);
            }
        }
    }

    /// Marks `[start, end)` in the pool ledger, publishing every checkpoint it moves to.
    fn advance_checkpoint(&self, start: u64, end: u64) {
        let Some(ledger) = &self.ctx.ledger else {
            return;
        };
        for cycle in start..end {
            let Some(checkpoint) = ledger.mark(cycle) else {
                continue;
            };
            if let Some(sink) = &self.ctx.sink {
                sink.on_checkpoint(checkpoint);
            }
            self.ctx
                .publish(self.ctx.event(EventKind::CheckpointAdvanced).with_cycle(checkpoint));
        }
    }

    /// Passes the segment's output through the barrier in position order.
    ///
    /// Positions continue across passes, so a replayed cycle orders after every cycle of the
    /// previous pass.
    async fn deliver_ordered(
        &mut self,
        seg: &CycleSegment,
        mut out: Vec<ResultSegment>,
    ) -> Result<(), ConfigError> {
        let Some(barrier) = self.ctx.barrier.clone() else {
            return Ok(());
        };
        out.extend(self.buffer.flush());

        let start = seg.start + seg.recycle * self.ctx.pass_len;
        let sink = self.ctx.sink.clone();
        barrier
            .await_and_run(start, start + seg.len(), move || {
                if let Some(sink) = sink {
                    for segment in out {
                        sink.on_segment(segment);
                    }
                }
            })
            .await
    }

    /// Moves the slot into its terminal state and publishes the matching event.
    fn settle(&self, exit: Exit, report: &mut MotorReport) {
        let id = self.id();
        let (state, kind, error) = match exit {
            Exit::Finished => {
                // A stop may have landed after the last claim.
                if self.slot.enter(RunState::Finished).is_some() {
                    (RunState::Finished, EventKind::MotorFinished, None)
                } else {
                    self.slot.enter(RunState::Stopped);
                    (RunState::Stopped, EventKind::MotorStopped, None)
                }
            }
            Exit::Stopped => {
                if self.slot.state() != RunState::Stopping {
                    self.slot.enter(RunState::Stopping);
                }
                self.slot.enter(RunState::Stopped);
                (RunState::Stopped, EventKind::MotorStopped, None)
            }
            Exit::Errored(err) => {
                self.slot.enter(RunState::Errored);
                (RunState::Errored, EventKind::MotorErrored, Some(err))
            }
        };

        let mut ev = self.ctx.event(kind).with_motor(id).with_state(state);
        if let Some(cycle) = report.last_cycle {
            ev = ev.with_cycle(cycle);
        }
        if let Some(err) = &error {
            ev = ev.with_reason(err.as_message());
        }
        self.ctx.publish(ev);

        report.state = state;
        report.error = error;
    }
}
