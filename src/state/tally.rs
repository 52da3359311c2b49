//! # Pool-wide run-state tally.
//!
//! Counts motors per [`RunState`] and lets a controller wait for conditions over those
//! counts. Waiters are woken only on zero edges (a count leaving or reaching zero), since
//! every await condition depends solely on which counts are non-zero.
//!
//! ```text
//! motor: change(Running, Finished)
//!   counts[Running] -= 1; counts[Finished] += 1
//!   Running hit 0 or Finished hit 1 ─► notify waiters
//!
//! controller: await_none_other([Finished], 5s)
//!   wait_for(all other counts == 0) or deadline ─► RunStateSnapshot { timed_out }
//! ```

use std::time::Duration;

use tokio::sync::watch;

use super::run_state::RunState;
use super::snapshot::RunStateSnapshot;

type Counts = [usize; RunState::COUNT];

/// Shared counts of motors per state.
#[derive(Debug)]
pub struct RunStateTally {
    counts: watch::Sender<Counts>,
}

impl Default for RunStateTally {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self {
            counts: watch::Sender::new([0; RunState::COUNT]),
        }
    }

    /// Motors currently in `state`.
    pub fn tally_for(&self, state: RunState) -> usize {
        self.counts.borrow()[state.index()]
    }

    /// Current counts, without a timeout flag.
    pub fn snapshot(&self) -> RunStateSnapshot {
        RunStateSnapshot::new(*self.counts.borrow(), false)
    }

    /// Starts tracking a motor in `state`.
    pub fn add(&self, state: RunState) {
        self.counts.send_if_modified(|c| {
            c[state.index()] += 1;
            c[state.index()] == 1
        });
    }

    /// Stops tracking a motor last seen in `state`.
    pub fn remove(&self, state: RunState) {
        self.counts.send_if_modified(|c| {
            let n = &mut c[state.index()];
            *n = n.saturating_sub(1);
            *n == 0
        });
    }

    /// Moves one motor from `from` to `to` atomically.
    pub fn change(&self, from: RunState, to: RunState) {
        self.counts.send_if_modified(|c| {
            let left = &mut c[from.index()];
            *left = left.saturating_sub(1);
            let from_zero = *left == 0;
            c[to.index()] += 1;
            let edge = from_zero || c[to.index()] == 1;
            if edge {
                tracing::trace!(%from, %to, "run-state edge");
            }
            edge
        });
    }

    /// Waits until at least one motor is in any of `states`.
    pub async fn await_any(
        &self,
        states: &[RunState],
        timeout: Option<Duration>,
    ) -> RunStateSnapshot {
        self.await_until(timeout, |c| states.iter().any(|s| c[s.index()] > 0))
            .await
    }

    /// Waits until no motor is in any of `states`.
    pub async fn await_none_of(
        &self,
        states: &[RunState],
        timeout: Option<Duration>,
    ) -> RunStateSnapshot {
        self.await_until(timeout, |c| states.iter().all(|s| c[s.index()] == 0))
            .await
    }

    /// Waits until every motor is in one of `states`.
    ///
    /// Holds immediately when no motors are tracked.
    pub async fn await_none_other(
        &self,
        states: &[RunState],
        timeout: Option<Duration>,
    ) -> RunStateSnapshot {
        self.await_until(timeout, |c| {
            RunState::ALL
                .iter()
                .filter(|s| !states.contains(*s))
                .all(|s| c[s.index()] == 0)
        })
        .await
    }

    async fn await_until<P>(&self, timeout: Option<Duration>, pred: P) -> RunStateSnapshot
    where
        P: Fn(&Counts) -> bool,
    {
        let mut rx = self.counts.subscribe();
        let met = async { rx.wait_for(|c| pred(c)).await.map(|c| *c).ok() };
        let seen = match timeout {
            Some(limit) => tokio::time::timeout(limit, met).await.ok().flatten(),
            None => met.await,
        };
        match seen {
            Some(counts) => RunStateSnapshot::new(counts, false),
            None => {
                let snap = RunStateSnapshot::new(*self.counts.borrow(), true);
                tracing::debug!(%snap, "run-state await timed out");
                snap
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn three_running_is_only_running() {
        let tally = RunStateTally::new();
        for _ in 0..3 {
            tally.add(RunState::Starting);
            tally.change(RunState::Starting, RunState::Running);
        }
        let snap = tally.snapshot();
        assert!(snap.is_only(RunState::Running));
        assert_eq!(snap.max_state(), Some(RunState::Running));
        assert_eq!(tally.tally_for(RunState::Starting), 0);
    }

    #[test]
    fn remove_never_underflows() {
        let tally = RunStateTally::new();
        tally.remove(RunState::Running);
        assert_eq!(tally.tally_for(RunState::Running), 0);
    }

    #[tokio::test]
    async fn await_none_other_wakes_on_last_transition() {
        let tally = Arc::new(RunStateTally::new());
        tally.add(RunState::Running);
        tally.add(RunState::Running);

        let t = Arc::clone(&tally);
        let waiter = tokio::spawn(async move {
            t.await_none_other(&[RunState::Finished], Some(Duration::from_secs(5)))
                .await
        });

        tally.change(RunState::Running, RunState::Finished);
        tally.change(RunState::Running, RunState::Finished);

        let snap = waiter.await.unwrap();
        assert!(!snap.is_timeout());
        assert!(snap.is_only(RunState::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn await_reports_timeout_without_touching_motors() {
        let tally = RunStateTally::new();
        tally.add(RunState::Running);
        let snap = tally
            .await_none_of(&[RunState::Running], Some(Duration::from_millis(50)))
            .await;
        assert!(snap.is_timeout());
        assert!(snap.is(RunState::Running));
    }

    #[tokio::test]
    async fn await_any_returns_immediately_when_met() {
        let tally = RunStateTally::new();
        tally.add(RunState::Errored);
        let snap = tally
            .await_any(&[RunState::Errored, RunState::Stopped], None)
            .await;
        assert!(!snap.is_timeout());
        assert_eq!(snap.max_state(), Some(RunState::Errored));
    }

    #[tokio::test]
    async fn none_other_holds_with_no_motors() {
        let tally = RunStateTally::new();
        let snap = tally.await_none_other(&[RunState::Finished], None).await;
        assert!(!snap.is_timeout());
        assert_eq!(snap.total(), 0);
    }
}
