//! # Activity: runs motors over a cycle range and decides when the run is over.
//!
//! The [`Activity`] owns the event bus, the run-state tally, one [`MotorSlot`] per motor and
//! the root cancellation token. It spawns the motors, fans events out to subscribers,
//! handles OS signals and stop requests, and enforces the stop grace period.
//!
//! ## High-level architecture
//! ```text
//! ActivityBuilder::build()
//!   - validate config, parse error policy (no partial startup on ConfigError)
//!   - cycle source: Shared (one cursor) | Striped (one stripe per motor)
//!   - optional CheckpointLedger (track_progress) and SequenceBarrier (ordered)
//!   - MotorSlot::register(i) for every motor → tally shows N × Starting
//!
//! Activity::run():
//!   subscriber listener: Bus.subscribe() ─► SubscriberSet::emit_arc(..)
//!   JoinSet ◄── motor[i].run(root.child_token())   (panics caught per motor)
//!
//!   select! {
//!     motor joined       → collect report; errored && halt_on_error → stop
//!     OS signal          → stop, then wait with grace
//!     stop requested     → wait with grace:
//!                            ├─ all joined → AllStoppedWithin
//!                            └─ timeout    → abort, GraceExceeded { stuck }
//!   }
//! ```
//!
//! ## Rules
//! - `run` may be called once; later calls return [`RuntimeError::AlreadyRan`].
//! - A stop moves every motor still `Starting`/`Running` to `Stopping`; each motor finishes
//!   its claimed segment and then enters `Stopped`.
//! - Controller awaits never interrupt motors; a missed deadline only flags the snapshot.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::config::ActivityConfig;
use super::context::ActivityContext;
use super::motor::{Motor, MotorReport};
use super::shutdown;
use crate::cycles::{AtomicCycleSource, CycleRange, CycleSource, SourceMode, StripedCycleSource};
use crate::error::{ConfigError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::ops::OperationRef;
use crate::policies::{ErrorPolicy, ErrorSummary};
use crate::results::Sink;
use crate::state::{MotorSlot, RunState, RunStateSnapshot, RunStateTally};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tracking::{CheckpointLedger, SequenceBarrier};

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct ActivityReport {
    /// Activity name.
    pub name: Arc<str>,
    /// Final run-state counts.
    pub snapshot: RunStateSnapshot,
    /// One report per motor, ordered by motor id.
    pub motors: Vec<MotorReport>,
    /// Failure tally by response and classifier.
    pub errors: ErrorSummary,
    /// Pool-wide checkpoint, when progress tracking is on.
    pub checkpoint: Option<u64>,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl ActivityReport {
    /// Cycles that reached a result, over all motors.
    pub fn cycles(&self) -> u64 {
        self.motors.iter().map(|m| m.cycles).sum()
    }

    /// Attempts dispatched, over all motors.
    pub fn tries(&self) -> u64 {
        self.motors.iter().map(|m| m.tries).sum()
    }

    /// Cycles whose result came from the error policy.
    pub fn failures(&self) -> u64 {
        self.motors.iter().map(|m| m.failures).sum()
    }

    /// Errors of motors that ended `Errored`.
    pub fn motor_errors(&self) -> impl Iterator<Item = &RuntimeError> {
        self.motors.iter().filter_map(|m| m.error.as_ref())
    }
}

struct Pending {
    motors: Vec<Motor>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

/// A configured pool of motors over one cycle range.
pub struct Activity {
    cfg: ActivityConfig,
    range: CycleRange,
    ctx: Arc<ActivityContext>,
    tally: Arc<RunStateTally>,
    slots: Vec<Arc<MotorSlot>>,
    token: CancellationToken,
    stop_requested: AtomicBool,
    pending: Mutex<Option<Pending>>,
    report: Mutex<Option<ActivityReport>>,
}

impl Activity {
    pub(crate) fn new(
        cfg: ActivityConfig,
        op: OperationRef,
        sink: Option<Arc<dyn Sink>>,
        subscribers: Vec<Arc<dyn Subscribe>>,
        policy: Option<ErrorPolicy>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let range = cfg.range()?;
        let shape = cfg.window()?;
        let policy = match policy {
            Some(p) => p,
            None => cfg.policy()?,
        };
        let recycles = cfg.recycles_clamped();

        let barrier = cfg.ordered.then(|| {
            let ceiling = range.start() + range.len().saturating_mul(recycles);
            Arc::new(SequenceBarrier::with_ceiling(range.start(), ceiling))
        });
        let ledger = cfg
            .track_progress
            .then(|| Arc::new(CheckpointLedger::new(shape, range)));

        let ctx = Arc::new(ActivityContext {
            name: Arc::from(cfg.name.as_str()),
            bus: Bus::new(cfg.bus_capacity_clamped()),
            policy: Arc::new(policy),
            backoff: cfg.retry_backoff,
            op_timeout: cfg.attempt_timeout(),
            shape,
            stride: cfg.stride,
            pass_len: range.len(),
            ledger,
            barrier,
            sink,
        });

        let sources: Vec<Arc<dyn CycleSource>> = match cfg.source {
            SourceMode::Shared => {
                let shared: Arc<dyn CycleSource> =
                    Arc::new(AtomicCycleSource::with_recycles(range, recycles));
                vec![shared; cfg.motors]
            }
            SourceMode::Striped => {
                let striped = StripedCycleSource::new(range, cfg.motors, recycles);
                (0..cfg.motors).map(|i| striped.stripe(i)).collect()
            }
        };

        let tally = Arc::new(RunStateTally::new());
        let mut slots = Vec::with_capacity(cfg.motors);
        let mut motors = Vec::with_capacity(cfg.motors);
        for (id, source) in sources.into_iter().enumerate() {
            let slot = Arc::new(MotorSlot::register(id, Arc::clone(&tally)));
            motors.push(Motor::new(
                Arc::clone(&slot),
                source,
                Arc::clone(&op),
                Arc::clone(&ctx),
                cfg.buffer_capacity,
            )?);
            slots.push(slot);
        }

        Ok(Self {
            cfg,
            range,
            ctx,
            tally,
            slots,
            token: CancellationToken::new(),
            stop_requested: AtomicBool::new(false),
            pending: Mutex::new(Some(Pending {
                motors,
                subscribers,
            })),
            report: Mutex::new(None),
        })
    }

    /// Activity name.
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// The configuration the activity was built from.
    pub fn config(&self) -> &ActivityConfig {
        &self.cfg
    }

    /// The cycle range.
    pub fn range(&self) -> CycleRange {
        self.range
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.bus.subscribe()
    }

    /// Current run-state counts.
    pub fn snapshot(&self) -> RunStateSnapshot {
        self.tally.snapshot()
    }

    /// Current state of motor `id`.
    pub fn motor_state(&self, id: usize) -> Option<RunState> {
        self.slots.get(id).map(|s| s.state())
    }

    /// The error policy in use, with its live failure metrics.
    pub fn policy(&self) -> &ErrorPolicy {
        &self.ctx.policy
    }

    /// Failure tally so far.
    pub fn error_summary(&self) -> ErrorSummary {
        self.ctx.policy.tally().summary()
    }

    /// Pool-wide checkpoint, or `None` without progress tracking or before the first
    /// window retires.
    pub fn checkpoint(&self) -> Option<u64> {
        self.ctx.ledger.as_ref().and_then(|l| l.checkpoint())
    }

    /// Output barrier of an ordered activity.
    pub fn barrier(&self) -> Option<Arc<SequenceBarrier>> {
        self.ctx.barrier.clone()
    }

    /// Waits until at least one motor is in any of `states`.
    pub async fn await_any(&self, states: &[RunState], timeout: Option<Duration>) -> RunStateSnapshot {
        self.tally.await_any(states, timeout).await
    }

    /// Waits until no motor is in any of `states`.
    pub async fn await_none_of(
        &self,
        states: &[RunState],
        timeout: Option<Duration>,
    ) -> RunStateSnapshot {
        self.tally.await_none_of(states, timeout).await
    }

    /// Waits until every motor is in one of `states`.
    pub async fn await_none_other(
        &self,
        states: &[RunState],
        timeout: Option<Duration>,
    ) -> RunStateSnapshot {
        self.tally.await_none_other(states, timeout).await
    }

    /// Report of the finished run, also kept when `run` returned a motor error.
    pub fn report(&self) -> Option<ActivityReport> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Asks every motor to stop after its current segment.
    ///
    /// Idempotent; only the first call publishes [`EventKind::StopRequested`].
    pub fn request_stop(&self) {
        self.stop_with("requested");
    }

    /// Runs every motor to a terminal state.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyRan`] on a second call.
    /// - [`RuntimeError::GraceExceeded`] when motors outlive the grace period after a stop.
    /// - With `halt_on_error`, the first [`RuntimeError::MotorErrored`] or
    ///   [`RuntimeError::MotorPanicked`]; the report stays available through
    ///   [`report`](Self::report). Without it, motor errors only appear in the report.
    pub async fn run(&self) -> Result<ActivityReport, RuntimeError> {
        let Pending {
            motors,
            subscribers,
        } = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RuntimeError::AlreadyRan)?;

        let started = Instant::now();
        let listener = self.subscriber_listener(subscribers);
        self.ctx.publish(self.ctx.event(EventKind::ActivityStarting).with_reason(format!(
            "range=[{}, {}) motors={}",
            self.range.start(),
            self.range.end(),
            motors.len()
        )));
        tracing::info!(
            activity = %self.ctx.name,
            start = self.range.start(),
            end = self.range.end(),
            motors = motors.len(),
            "activity starting"
        );

        let mut set = JoinSet::new();
        for motor in motors {
            let id = motor.id();
            let child = self.token.child_token();
            set.spawn(async move {
                match AssertUnwindSafe(motor.run(child)).catch_unwind().await {
                    Ok(report) => report,
                    Err(_) => MotorReport::panicked(id),
                }
            });
        }

        let outcome = self.drive(&mut set).await;
        let snapshot = self.tally.snapshot();
        tracing::info!(activity = %self.ctx.name, %snapshot, "activity done");
        if let Some((done, handle)) = listener {
            done.cancel();
            let _ = handle.await;
        }

        let mut reports = outcome?;
        reports.sort_by_key(|r| r.motor);
        let report = ActivityReport {
            name: Arc::clone(&self.ctx.name),
            snapshot,
            motors: reports,
            errors: self.error_summary(),
            checkpoint: self.checkpoint(),
            elapsed: started.elapsed(),
        };
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());

        if self.cfg.halt_on_error {
            if let Some(err) = report.motor_errors().next() {
                return Err(err.clone());
            }
        }
        Ok(report)
    }

    /// Waits until either all motors finish or a stop is requested.
    async fn drive(
        &self,
        set: &mut JoinSet<MotorReport>,
    ) -> Result<Vec<MotorReport>, RuntimeError> {
        let mut reports = Vec::with_capacity(self.slots.len());
        let signal = stop_signal(self.cfg.handle_signals);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(joined) => self.collect(joined, &mut reports),
                    None => return Ok(reports),
                },
                () = &mut signal => {
                    self.stop_with("signal");
                    return self.wait_all_with_grace(set, reports).await;
                }
                () = self.token.cancelled() => {
                    return self.wait_all_with_grace(set, reports).await;
                }
            }
        }
    }

    /// Waits for the remaining motors within the configured grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or aborts the stragglers,
    /// publishes [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`].
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<MotorReport>,
        mut reports: Vec<MotorReport>,
    ) -> Result<Vec<MotorReport>, RuntimeError> {
        let grace = self.cfg.grace;
        let done = async {
            while let Some(joined) = set.join_next().await {
                self.collect(joined, &mut reports);
            }
        };

        if tokio::time::timeout(grace, done).await.is_ok() {
            self.ctx.publish(self.ctx.event(EventKind::AllStoppedWithin));
            return Ok(reports);
        }

        set.abort_all();
        while set.join_next().await.is_some() {}
        let stuck: Vec<usize> = self
            .slots
            .iter()
            .filter(|s| !s.state().is_terminal())
            .map(|s| s.id())
            .collect();
        for id in &stuck {
            self.slots[*id].enter(RunState::Errored);
        }
        tracing::error!(activity = %self.ctx.name, ?grace, ?stuck, "grace exceeded");
        self.ctx.publish(
            self.ctx
                .event(EventKind::GraceExceeded)
                .with_delay(grace)
                .with_reason(format!("{stuck:?}")),
        );
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    fn collect(&self, joined: Result<MotorReport, JoinError>, reports: &mut Vec<MotorReport>) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(error = %e, "motor task did not complete");
                return;
            }
        };
        if let Some(RuntimeError::MotorPanicked { motor }) = &report.error {
            self.on_panic(*motor);
        }
        if report.error.is_some() && self.cfg.halt_on_error {
            self.stop_with("motor errored");
        }
        reports.push(report);
    }

    fn on_panic(&self, motor: usize) {
        if let Some(slot) = self.slots.get(motor) {
            slot.enter(RunState::Errored);
        }
        tracing::error!(activity = %self.ctx.name, motor, "motor panicked");
        self.ctx.publish(
            self.ctx
                .event(EventKind::MotorErrored)
                .with_motor(motor)
                .with_state(RunState::Errored)
                .with_reason("panicked"),
        );
    }

    fn stop_with(&self, reason: &'static str) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(activity = %self.ctx.name, reason, "stop requested");
        self.ctx
            .publish(self.ctx.event(EventKind::StopRequested).with_reason(reason));
        for slot in &self.slots {
            slot.request_stop();
        }
        self.token.cancel();
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// Returns the token that ends the listener (after draining what is queued) and its
    /// handle, or `None` without subscribers.
    fn subscriber_listener(
        &self,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Option<(CancellationToken, JoinHandle<()>)> {
        if subscribers.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(subscribers, self.ctx.bus.clone());
        let mut rx = self.ctx.bus.subscribe();
        let done = CancellationToken::new();
        let stop = done.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    () = stop.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit_arc(Arc::new(ev));
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        Some((done, handle))
    }
}

/// Completes on an OS stop signal; never completes when signals are not handled.
async fn stop_signal(handle_signals: bool) {
    if handle_signals {
        match shutdown::wait_for_stop_signal().await {
            Ok(()) => return,
            Err(e) => tracing::warn!(error = %e, "stop signals unavailable"),
        }
    }
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationFailure;
    use crate::ops::OpFn;

    fn cfg(start: u64, end: u64, motors: usize) -> ActivityConfig {
        let mut cfg = ActivityConfig::for_range(start, end);
        cfg.motors = motors;
        cfg.handle_signals = false;
        cfg
    }

    fn ok_op() -> OperationRef {
        OpFn::arc("ok", |_c: u64| async { Ok::<i8, OperationFailure>(0) })
    }

    #[test]
    fn build_registers_motors_as_starting() {
        let activity = Activity::new(cfg(0, 10, 3), ok_op(), None, Vec::new(), None).unwrap();
        let snap = activity.snapshot();
        assert!(snap.is_only(RunState::Starting));
        assert_eq!(snap.total(), 3);
        assert_eq!(activity.motor_state(2), Some(RunState::Starting));
    }

    #[test]
    fn invalid_config_builds_nothing() {
        let mut c = cfg(0, 10, 1);
        c.errors = "[:stop".into();
        assert!(matches!(
            Activity::new(c, ok_op(), None, Vec::new(), None),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let activity = Activity::new(cfg(0, 4, 1), ok_op(), None, Vec::new(), None).unwrap();
        let report = activity.run().await.unwrap();
        assert_eq!(report.cycles(), 4);
        assert!(matches!(activity.run().await, Err(RuntimeError::AlreadyRan)));
    }

    #[tokio::test]
    async fn empty_range_finishes_immediately() {
        let activity = Activity::new(cfg(5, 5, 2), ok_op(), None, Vec::new(), None).unwrap();
        let report = activity.run().await.unwrap();
        assert!(report.snapshot.is_only(RunState::Finished));
        assert_eq!(report.cycles(), 0);
        assert_eq!(report.checkpoint, None);
    }
}
