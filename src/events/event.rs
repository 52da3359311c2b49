//! # Runtime events emitted by the activity controller and its motors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Motor lifecycle**: motor state edges (starting, running, finished, stopped, errored)
//! - **Cycle outcomes**: retries and failures resolved by the error policy
//! - **Progress**: checkpoint advancement
//! - **Shutdown and subscribers**: stop requests, grace handling, subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, activity name, motor
//! id, cycle, attempt and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use cyclemotor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CycleRetried)
//!     .with_activity("load")
//!     .with_motor(2)
//!     .with_cycle(1_042)
//!     .with_attempt(3)
//!     .with_reason("Overloaded: busy");
//!
//! assert_eq!(ev.kind, EventKind::CycleRetried);
//! assert_eq!(ev.motor, Some(2));
//! assert_eq!(ev.cycle, Some(1_042));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::state::RunState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Activity / shutdown events ===
    /// Activity is about to spawn its motors.
    ///
    /// Sets:
    /// - `activity`: activity name
    /// - `reason`: range and motor count summary
    ActivityStarting,

    /// Stop requested (OS signal or [`Activity::request_stop`](crate::Activity::request_stop)).
    ///
    /// Sets:
    /// - `activity`: activity name
    /// - `reason`: what triggered the stop
    StopRequested,

    /// All motors reached a terminal state within the grace period.
    ///
    /// Sets:
    /// - `activity`: activity name
    AllStoppedWithin,

    /// Grace period exceeded; remaining motors were aborted.
    ///
    /// Sets:
    /// - `activity`: activity name
    /// - `reason`: stuck motor ids
    /// - `delay_ms`: the grace period (ms)
    GraceExceeded,

    // === Motor lifecycle events ===
    /// Motor registered and about to claim its first segment.
    ///
    /// Sets: `activity`, `motor`, `state` (= `Starting`)
    MotorStarting,

    /// Motor entered `Running`.
    ///
    /// Sets: `activity`, `motor`, `state`
    MotorRunning,

    /// Motor exhausted its cycle source.
    ///
    /// Sets: `activity`, `motor`, `state`, `cycle` (last finished cycle, if any)
    MotorFinished,

    /// Motor honored a stop request.
    ///
    /// Sets: `activity`, `motor`, `state`, `cycle` (last finished cycle, if any)
    MotorStopped,

    /// Motor halted on a `stop` response or a panic.
    ///
    /// Sets: `activity`, `motor`, `state`, `cycle`, `reason`
    MotorErrored,

    // === Cycle outcomes ===
    /// A failed attempt will be retried.
    ///
    /// Sets: `activity`, `motor`, `cycle`, `attempt` (the failed one), `reason`,
    /// `delay_ms` (backoff before the next attempt)
    CycleRetried,

    /// A cycle finished with a failure that the policy let through.
    ///
    /// Sets: `activity`, `motor`, `cycle`, `attempt`, `reason`
    CycleFailed,

    // === Progress ===
    /// The pool-wide checkpoint moved forward.
    ///
    /// Sets: `activity`, `cycle` (new checkpoint)
    CheckpointAdvanced,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Activity name, if applicable.
    pub activity: Option<Arc<str>>,
    /// Motor slot id, if applicable.
    pub motor: Option<usize>,
    /// Cycle the event refers to.
    pub cycle: Option<u64>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Motor state carried by lifecycle events.
    pub state: Option<RunState>,
    /// Delay in milliseconds (backoff, grace).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Subscriber name for subscriber health events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            activity: None,
            motor: None,
            cycle: None,
            attempt: None,
            state: None,
            delay_ms: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches an activity name.
    #[inline]
    pub fn with_activity(mut self, name: impl Into<Arc<str>>) -> Self {
        self.activity = Some(name.into());
        self
    }

    /// Attaches a motor id.
    #[inline]
    pub fn with_motor(mut self, motor: usize) -> Self {
        self.motor = Some(motor);
        self
    }

    /// Attaches a cycle.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a motor state.
    #[inline]
    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::MotorStarting);
        let b = Event::new(EventKind::MotorRunning);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_events_carry_name() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.subscriber, Some("log"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=log reason=full"));
    }
}
