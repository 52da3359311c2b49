//! # Range-ordered execution barrier.
//!
//! Callers register half-open ranges `[start, end)`; each waits until the barrier's floor
//! equals its `start`, runs its action, then moves the floor to `end`. Ranges therefore
//! execute in ascending order regardless of arrival order, and a missing range holds back
//! everything after it.
//!
//! ```text
//!   floor=234
//!   (249,253) ─ wait ──────────────────────────────┐
//!   (247,249) ─ wait ─────────────────────┐        │
//!   (234,247) ─ run ─► floor=247 ─► wake ─► run ─► floor=249 ─► run ─► floor=253
//! ```
//!
//! ## Rules
//! - The floor only moves forward.
//! - The floor advances to `end` even if the action panics or returns an error value; the
//!   outcome is then handed back to the caller.
//! - A range whose `start` is already behind the floor is rejected.

use tokio::sync::watch;

use crate::error::ConfigError;

/// Ordering gate keyed by half-open cycle ranges.
#[derive(Debug)]
pub struct SequenceBarrier {
    floor: watch::Sender<u64>,
    ceiling: Option<u64>,
}

impl SequenceBarrier {
    /// Creates a barrier at `floor` with no ceiling.
    pub fn new(floor: u64) -> Self {
        Self {
            floor: watch::Sender::new(floor),
            ceiling: None,
        }
    }

    /// Creates a barrier at `floor` whose [`await_completion`](Self::await_completion)
    /// resolves once the floor reaches `ceiling`.
    pub fn with_ceiling(floor: u64, ceiling: u64) -> Self {
        Self {
            floor: watch::Sender::new(floor),
            ceiling: Some(ceiling),
        }
    }

    /// Current floor.
    pub fn floor(&self) -> u64 {
        *self.floor.borrow()
    }

    /// Configured ceiling, if any.
    pub fn ceiling(&self) -> Option<u64> {
        self.ceiling
    }

    /// Waits for the floor to reach `start`, runs `action`, then advances the floor to `end`.
    ///
    /// The action's return value is passed through untouched; a fallible action returns its
    /// own `Result` inside the `Ok`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidRange`] when `start > end`.
    /// - [`ConfigError::StaleRange`] when the floor has already passed `start`.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::SequenceBarrier;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let barrier = SequenceBarrier::new(10);
    /// let out = barrier.await_and_run(10, 15, || "ran").await.unwrap();
    /// assert_eq!(out, "ran");
    /// assert_eq!(barrier.floor(), 15);
    /// # }
    /// ```
    pub async fn await_and_run<T, F>(
        &self,
        start: u64,
        end: u64,
        action: F,
    ) -> Result<T, ConfigError>
    where
        F: FnOnce() -> T,
    {
        if start > end {
            return Err(ConfigError::InvalidRange { start, end });
        }
        let floor = self.await_floor(start).await?;
        if floor != start {
            return Err(ConfigError::StaleRange { start, floor });
        }

        let _advance = AdvanceOnDrop {
            floor: &self.floor,
            end,
        };
        Ok(action())
    }

    /// Waits until the floor is at least `target` and returns the observed floor.
    ///
    /// # Errors
    /// [`ConfigError::BarrierClosed`] if the floor can no longer be observed.
    pub async fn await_floor(&self, target: u64) -> Result<u64, ConfigError> {
        let mut rx = self.floor.subscribe();
        let floor = rx
            .wait_for(|f| *f >= target)
            .await
            .map_err(|_| ConfigError::BarrierClosed)?;
        Ok(*floor)
    }

    /// Waits until the floor reaches the ceiling. Without a ceiling this never resolves.
    ///
    /// # Errors
    /// [`ConfigError::BarrierClosed`] if the floor can no longer be observed.
    pub async fn await_completion(&self) -> Result<u64, ConfigError> {
        match self.ceiling {
            Some(ceiling) => self.await_floor(ceiling).await,
            None => std::future::pending().await,
        }
    }
}

/// Moves the floor to `end` when dropped.
struct AdvanceOnDrop<'a> {
    floor: &'a watch::Sender<u64>,
    end: u64,
}

impl Drop for AdvanceOnDrop<'_> {
    fn drop(&mut self) {
        let end = self.end;
        self.floor.send_if_modified(|f| {
            if end > *f {
                *f = end;
                true
            } else {
                false
            }
        });
    }
}
