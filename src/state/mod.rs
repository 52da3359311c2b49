//! # Run-state tracking.
//!
//! - [`RunState`]: the per-motor lifecycle, ordered by severity.
//! - [`MotorSlot`]: one motor's current state; the motor mutates it, the controller may only
//!   request `Stopping`.
//! - [`RunStateTally`]: pool-wide counts with deadline-capable awaits.
//! - [`RunStateSnapshot`]: immutable counts returned by polls and awaits.

mod motor_state;
mod run_state;
mod snapshot;
mod tally;

pub use motor_state::MotorSlot;
pub use run_state::RunState;
pub use snapshot::RunStateSnapshot;
pub use tally::RunStateTally;
