//! # LogWriter
//!
//! A subscriber that renders incoming [`Event`]s as `tracing` records. Routine lifecycle
//! edges go to `debug`, progress and outcomes to `info`/`warn`, halts to `error`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let activity = e.activity.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ActivityStarting => {
                tracing::info!(activity, reason, "activity starting");
            }
            EventKind::StopRequested => {
                tracing::info!(activity, reason, "stop requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(activity, "all motors stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(activity, grace_ms = ?e.delay_ms, stuck = reason, "grace exceeded");
            }
            EventKind::MotorStarting | EventKind::MotorRunning => {
                tracing::debug!(activity, motor = ?e.motor, state = ?e.state, "motor state");
            }
            EventKind::MotorFinished | EventKind::MotorStopped => {
                tracing::info!(
                    activity,
                    motor = ?e.motor,
                    state = ?e.state,
                    last_cycle = ?e.cycle,
                    "motor done"
                );
            }
            EventKind::MotorErrored => {
                tracing::error!(activity, motor = ?e.motor, cycle = ?e.cycle, reason, "motor errored");
            }
            EventKind::CycleRetried => {
                tracing::debug!(
                    activity,
                    motor = ?e.motor,
                    cycle = ?e.cycle,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    reason,
                    "cycle retry"
                );
            }
            EventKind::CycleFailed => {
                tracing::debug!(
                    activity,
                    motor = ?e.motor,
                    cycle = ?e.cycle,
                    attempt = ?e.attempt,
                    reason,
                    "cycle failed"
                );
            }
            EventKind::CheckpointAdvanced => {
                tracing::debug!(activity, checkpoint = ?e.cycle, "checkpoint");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = ?e.subscriber, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(subscriber = ?e.subscriber, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
