//! # Run one cycle to its final result.
//!
//! Dispatches attempts of an [`Operation`] for a single cycle until it succeeds or the
//! [`ErrorPolicy`](crate::ErrorPolicy) settles the failure.
//!
//! ## Flow
//! ```text
//! attempt 1 ─► op.dispense(cycle) ─► Ok(code)               → Done { result: code }
//!                                 └► Err(failure)
//!                                      └► policy.handle(...)
//!                                           ├─ Retry        → publish CycleRetried, sleep backoff,
//!                                           │                 attempt + 1
//!                                           ├─ Continue     → publish CycleFailed → Done { result: rule code }
//!                                           └─ Stop         → Halt { result: rule code, failure }
//! ```
//!
//! ## Rules
//! - Every attempt gets a fresh future from [`Operation::dispense`].
//! - An attempt exceeding the timeout fails as [`OperationFailure::Timeout`].
//! - Attempts are counted from 1; the policy bounds them by `max_tries`.

use std::time::Instant;

use tokio::time;

use super::context::ActivityContext;
use crate::error::OperationFailure;
use crate::events::EventKind;
use crate::ops::Operation;
use crate::policies::Verdict;

/// Final state of one cycle.
#[derive(Debug)]
pub(crate) enum CycleOutcome {
    /// The cycle has a result; `failed` marks a failure the policy let through.
    Done { result: i8, tries: u32, failed: bool },
    /// The policy resolved the failure to `stop`.
    Halt {
        result: i8,
        tries: u32,
        failure: OperationFailure,
    },
}

impl CycleOutcome {
    pub fn result(&self) -> i8 {
        match self {
            CycleOutcome::Done { result, .. } | CycleOutcome::Halt { result, .. } => *result,
        }
    }

    pub fn tries(&self) -> u32 {
        match self {
            CycleOutcome::Done { tries, .. } | CycleOutcome::Halt { tries, .. } => *tries,
        }
    }
}

/// Runs `cycle` on motor `motor` until it has a final result.
pub(crate) async fn run_cycle(
    op: &dyn Operation,
    cycle: u64,
    motor: usize,
    ctx: &ActivityContext,
) -> CycleOutcome {
    let mut attempt: u32 = 1;
    loop {
        let started = Instant::now();
        let res = match ctx.op_timeout {
            Some(dur) => match time::timeout(dur, op.dispense(cycle)).await {
                Ok(r) => r,
                Err(_elapsed) => Err(OperationFailure::Timeout { timeout: dur }),
            },
            None => op.dispense(cycle).await,
        };

        let failure = match res {
            Ok(result) => {
                return CycleOutcome::Done {
                    result,
                    tries: attempt,
                    failed: false,
                };
            }
            Err(failure) => failure,
        };

        match ctx.policy.handle(&failure, cycle, attempt, started.elapsed()) {
            Verdict::Retry => {
                let delay = ctx.backoff.next(attempt - 1);
                ctx.publish(
                    ctx.event(EventKind::CycleRetried)
                        .with_motor(motor)
                        .with_cycle(cycle)
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(failure.to_string()),
                );
                if !delay.is_zero() {
                    time::sleep(delay).await;
                }
                attempt = attempt.saturating_add(1);
            }
            Verdict::Continue { code } => {
                ctx.publish(
                    ctx.event(EventKind::CycleFailed)
                        .with_motor(motor)
                        .with_cycle(cycle)
                        .with_attempt(attempt)
                        .with_reason(failure.to_string()),
                );
                return CycleOutcome::Done {
                    result: code,
                    tries: attempt,
                    failed: true,
                };
            }
            Verdict::Stop { code } => {
                return CycleOutcome::Halt {
                    result: code,
                    tries: attempt,
                    failure,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::CycleRange;
    use crate::events::Bus;
    use crate::ops::{OpFn, OperationRef};
    use crate::policies::{ErrorPolicy, RetryBackoff};
    use crate::tracking::WindowShape;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ctx(spec: &str, max_tries: u32) -> ActivityContext {
        let range = CycleRange::new(0, 10).unwrap();
        ActivityContext {
            name: "test".into(),
            bus: Bus::new(64),
            policy: Arc::new(ErrorPolicy::parse(spec).unwrap().with_max_tries(max_tries)),
            backoff: RetryBackoff::default(),
            op_timeout: None,
            shape: WindowShape::default(),
            stride: 1,
            pass_len: range.len(),
            ledger: None,
            barrier: None,
            sink: None,
        }
    }

    fn always_failing(calls: Arc<AtomicU32>) -> OperationRef {
        OpFn::arc("flaky", move |_cycle: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i8, _>(OperationFailure::new("Overloaded", "busy")) }
        })
    }

    #[tokio::test]
    async fn success_is_one_try() {
        let op = OpFn::new("ok", |cycle: u64| async move { Ok::<i8, OperationFailure>(cycle as i8) });
        let out = run_cycle(&op, 7, 0, &ctx("stop", 3)).await;
        assert!(matches!(out, CycleOutcome::Done { result: 7, tries: 1, failed: false }));
    }

    #[tokio::test]
    async fn retries_exactly_max_tries_then_settles() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = always_failing(Arc::clone(&calls));
        let ctx = ctx("Overloaded:retry,count,9", 3);
        let mut rx = ctx.bus.subscribe();

        let out = run_cycle(op.as_ref(), 4, 1, &ctx).await;
        assert!(matches!(out, CycleOutcome::Done { result: 9, tries: 3, failed: true }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::CycleRetried, EventKind::CycleRetried, EventKind::CycleFailed]
        );
    }

    #[tokio::test]
    async fn bare_retry_halts_once_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = always_failing(Arc::clone(&calls));
        let out = run_cycle(op.as_ref(), 4, 0, &ctx("Overloaded:retry", 3)).await;
        match out {
            CycleOutcome::Halt { result, tries, failure } => {
                assert_eq!(result, crate::policies::DEFAULT_FAILURE_CODE);
                assert_eq!(tries, 3);
                assert_eq!(failure.classifier(), "Overloaded");
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let op = OpFn::new("slow", |_cycle: u64| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<i8, OperationFailure>(0)
        });
        let mut ctx = ctx("Timeout:ignore,3;stop", 1);
        ctx.op_timeout = Some(Duration::from_millis(50));

        let out = run_cycle(&op, 0, 0, &ctx).await;
        assert!(matches!(out, CycleOutcome::Done { result: 3, tries: 1, failed: true }));
        assert_eq!(ctx.policy.tally().responses(crate::policies::Response::Ignore), 1);
    }
}
