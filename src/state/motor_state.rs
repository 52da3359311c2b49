//! # Per-motor state slot.
//!
//! A [`MotorSlot`] owns one motor's [`RunState`] and keeps the pool [`RunStateTally`] in
//! step with it. The motor drives every transition; the controller may only ask for
//! `Stopping` through [`request_stop`](MotorSlot::request_stop).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use super::run_state::RunState;
use super::tally::RunStateTally;

/// One motor's lifecycle state, mirrored into the pool tally.
#[derive(Debug)]
pub struct MotorSlot {
    id: usize,
    state: AtomicU8,
    tally: Arc<RunStateTally>,
}

impl MotorSlot {
    /// Registers motor `id` in `Starting`.
    pub fn register(id: usize, tally: Arc<RunStateTally>) -> Self {
        tally.add(RunState::Starting);
        Self {
            id,
            state: AtomicU8::new(RunState::Starting as u8),
            tally,
        }
    }

    /// Slot id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        RunState::from_index(self.state.load(Ordering::Acquire)).unwrap_or(RunState::Errored)
    }

    /// Moves to `next` if the lifecycle allows it from the current state.
    ///
    /// Returns the state that was left, or `None` when the transition is not allowed (the
    /// slot is unchanged).
    pub fn enter(&self, next: RunState) -> Option<RunState> {
        let mut cur = self.state.load(Ordering::Acquire);
        loop {
            let from = RunState::from_index(cur)?;
            if !from.can_transition_to(next) {
                tracing::trace!(motor = self.id, %from, to = %next, "transition refused");
                return None;
            }
            match self.state.compare_exchange_weak(
                cur,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.tally.change(from, next);
                    tracing::debug!(motor = self.id, %from, to = %next, "motor state");
                    return Some(from);
                }
                Err(seen) => cur = seen,
            }
        }
    }

    /// Asks the motor to stop. No effect once it is stopping or terminal.
    pub fn request_stop(&self) -> bool {
        self.enter(RunState::Stopping).is_some()
    }

    /// True when a stop was requested and the motor has not yet acknowledged it.
    pub fn is_stopping(&self) -> bool {
        self.state() == RunState::Stopping
    }
}
