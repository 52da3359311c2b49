//! # Motor lifecycle states.
//!
//! ```text
//! Starting ──► Running ──► Finished
//!    │            │
//!    │            ├──► Stopping ──► Stopped
//!    │            │        │
//!    ├────────────┴────────┴──► Errored
//!    └──► Stopping
//! ```
//!
//! Variants are declared in ascending severity, so `Ord` ranks them and
//! [`RunStateSnapshot::max_state`](crate::RunStateSnapshot::max_state) can pick the worst.

use std::fmt;

/// Lifecycle state of one motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RunState {
    /// Registered; not yet dispatching cycles.
    Starting = 0,
    /// Dispatching cycles.
    Running = 1,
    /// Source exhausted; terminal.
    Finished = 2,
    /// Stop requested; finishing claimed work.
    Stopping = 3,
    /// Stopped on request; terminal.
    Stopped = 4,
    /// Halted by a `stop` response or a panic; terminal.
    Errored = 5,
}

impl RunState {
    /// Every state, in ascending severity.
    pub const ALL: [RunState; 6] = [
        RunState::Starting,
        RunState::Running,
        RunState::Finished,
        RunState::Stopping,
        RunState::Stopped,
        RunState::Errored,
    ];

    /// Number of states.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of the state in [`ALL`](Self::ALL).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(usize::from(idx)).copied()
    }

    /// True for `Finished`, `Stopped` and `Errored`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Stopped | RunState::Errored)
    }

    /// True if a motor may move from `self` to `next`.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::RunState;
    ///
    /// assert!(RunState::Running.can_transition_to(RunState::Stopping));
    /// assert!(!RunState::Finished.can_transition_to(RunState::Running));
    /// ```
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Starting, Running | Stopping | Errored)
                | (Running, Finished | Stopping | Errored)
                | (Stopping, Stopped | Errored)
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Finished => "finished",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Errored => "errored",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
