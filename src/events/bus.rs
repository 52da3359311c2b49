//! # Event bus for broadcasting activity events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so motors, the controller and subscriber workers
//! can publish without ever blocking the cycle loop.
//!
//! ```text
//! Publishers (many):                     Listener (one per activity):
//!   Motor 0    ──┐
//!   Motor N    ──┼──► Bus ──► Activity fan-out task ──► SubscriberSet ──► LogWriter, ...
//!   Controller ──┘ (ring buffer)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; without receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - A receiver that falls behind gets `RecvError::Lagged(n)` and skips the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for activity events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` undelivered events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receivers(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_after_subscribing() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::MotorStarting));

        let mut rx = bus.subscribe();
        assert_eq!(bus.receivers(), 1);
        bus.publish(Event::new(EventKind::MotorRunning).with_motor(1));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::MotorRunning);
        assert_eq!(ev.motor, Some(1));
    }
}
