//! Per-activity context shared by reference with every motor.
//!
//! Holds everything a motor reads but does not own: the bus, the error policy, the
//! pool-wide ledger and barrier, the sink, and the attempt settings.

use std::sync::Arc;
use std::time::Duration;

use crate::events::{Bus, Event, EventKind};
use crate::policies::{ErrorPolicy, RetryBackoff};
use crate::results::Sink;
use crate::tracking::{CheckpointLedger, SequenceBarrier, WindowShape};

pub(crate) struct ActivityContext {
    pub name: Arc<str>,
    pub bus: Bus,
    pub policy: Arc<ErrorPolicy>,
    pub backoff: RetryBackoff,
    pub op_timeout: Option<Duration>,
    pub shape: WindowShape,
    pub stride: u64,
    /// Positions per pass; orders segments of different passes on the barrier.
    pub pass_len: u64,
    pub ledger: Option<Arc<CheckpointLedger>>,
    pub barrier: Option<Arc<SequenceBarrier>>,
    pub sink: Option<Arc<dyn Sink>>,
}

impl ActivityContext {
    /// Event of `kind` tagged with this activity's name.
    pub fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_activity(Arc::clone(&self.name))
    }

    pub fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }
}
