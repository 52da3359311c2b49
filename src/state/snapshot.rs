//! # Point-in-time view of motor states.

use std::fmt;

use super::run_state::RunState;

/// Immutable counts of motors per [`RunState`], taken at one instant.
///
/// Snapshots returned from a controller await carry [`is_timeout`](Self::is_timeout) when
/// the awaited condition was not met before the deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunStateSnapshot {
    counts: [usize; RunState::COUNT],
    timed_out: bool,
}

impl RunStateSnapshot {
    pub(crate) fn new(counts: [usize; RunState::COUNT], timed_out: bool) -> Self {
        Self { counts, timed_out }
    }

    /// Motors currently in `state`.
    pub fn count(&self, state: RunState) -> usize {
        self.counts[state.index()]
    }

    /// Motors tracked in any state.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// True if at least one motor is in `state`.
    pub fn is(&self, state: RunState) -> bool {
        self.count(state) > 0
    }

    /// True if at least one motor is in `state` and none is in any other.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::{RunState, RunStateTally};
    ///
    /// let tally = RunStateTally::new();
    /// for _ in 0..3 {
    ///     tally.add(RunState::Running);
    /// }
    /// let snap = tally.snapshot();
    /// assert!(snap.is_only(RunState::Running));
    /// assert_eq!(snap.max_state(), Some(RunState::Running));
    /// ```
    pub fn is_only(&self, state: RunState) -> bool {
        self.is(state) && self.total() == self.count(state)
    }

    /// True if every motor is in one of `states` (vacuously true with no motors).
    pub fn is_none_other(&self, states: &[RunState]) -> bool {
        RunState::ALL
            .iter()
            .filter(|s| !states.contains(*s))
            .all(|s| !self.is(*s))
    }

    /// Most severe state any motor is in, or `None` with no motors tracked.
    pub fn max_state(&self) -> Option<RunState> {
        RunState::ALL.into_iter().rev().find(|s| self.is(*s))
    }

    /// True if this snapshot ends an await whose condition did not hold in time.
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl fmt::Display for RunStateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, state) in RunState::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{state}({})", self.count(*state))?;
        }
        if self.timed_out {
            f.write_str(" [timeout]")?;
        }
        Ok(())
    }
}
