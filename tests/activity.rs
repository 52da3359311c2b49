use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cyclemotor::{
    ActivityBuilder, ActivityConfig, ChannelSink, CollectingSink, Event, EventKind, OpFn,
    OperationFailure, OperationRef, Response, RunState, RuntimeError, SourceMode, Subscribe,
};

fn config(start: u64, end: u64, motors: usize) -> ActivityConfig {
    let mut cfg = ActivityConfig::for_range(start, end);
    cfg.motors = motors;
    cfg.handle_signals = false;
    cfg
}

fn echo() -> OperationRef {
    OpFn::arc("echo", |cycle: u64| async move {
        Ok::<i8, OperationFailure>((cycle % 100) as i8)
    })
}

fn sleeper(per_cycle: Duration) -> OperationRef {
    OpFn::arc("sleeper", move |_cycle: u64| async move {
        tokio::time::sleep(per_cycle).await;
        Ok::<i8, OperationFailure>(0)
    })
}

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

impl Recorder {
    fn count(&self, kind: EventKind) -> usize {
        self.kinds.lock().unwrap().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.kinds.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_pool_dispatches_every_cycle_once() {
    let mut cfg = config(0, 5_000, 4);
    cfg.stride = 8;
    cfg.buffer_capacity = 64;
    let sink = Arc::new(CollectingSink::new());

    let activity = ActivityBuilder::new(cfg, echo())
        .with_sink(sink.clone())
        .build()
        .unwrap();
    let report = activity.run().await.unwrap();

    assert!(report.snapshot.is_only(RunState::Finished));
    assert_eq!(report.snapshot.max_state(), Some(RunState::Finished));
    assert_eq!(report.cycles(), 5_000);
    assert_eq!(report.tries(), 5_000);
    assert_eq!(report.checkpoint, Some(4_999));
    assert_eq!(sink.checkpoint(), Some(4_999));

    let results = sink.results();
    let cycles: Vec<u64> = results.iter().map(|r| r.cycle).collect();
    assert_eq!(cycles, (0..5_000).collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.result == (r.cycle % 100) as i8));
}

#[tokio::test]
async fn striped_recycles_replay_each_stripe() {
    let mut cfg = config(0, 100, 3);
    cfg.source = SourceMode::Striped;
    cfg.recycles = 2;
    cfg.stride = 7;
    let sink = Arc::new(CollectingSink::new());

    let activity = ActivityBuilder::new(cfg, echo())
        .with_sink(sink.clone())
        .build()
        .unwrap();
    let report = activity.run().await.unwrap();

    assert_eq!(report.cycles(), 200);
    assert_eq!(report.checkpoint, Some(99));

    let mut seen: HashMap<u64, usize> = HashMap::new();
    for r in sink.results() {
        *seen.entry(r.cycle).or_default() += 1;
    }
    assert_eq!(seen.len(), 100);
    assert!(seen.values().all(|n| *n == 2));
}

#[tokio::test(start_paused = true)]
async fn ordered_output_arrives_in_cycle_order() {
    let mut cfg = config(0, 400, 4);
    cfg.ordered = true;
    cfg.stride = 5;
    cfg.buffer_capacity = 3;

    let op = OpFn::arc("jitter", |cycle: u64| async move {
        tokio::time::sleep(Duration::from_micros((cycle * 7 % 13) * 100)).await;
        Ok::<i8, OperationFailure>(1)
    });
    let (sink, mut rx) = ChannelSink::new();
    let activity = ActivityBuilder::new(cfg, op)
        .with_sink(Arc::new(sink))
        .build()
        .unwrap();
    activity.run().await.unwrap();

    let mut cycles = Vec::new();
    while let Ok(segment) = rx.try_recv() {
        assert!(segment.len() <= 3);
        cycles.extend(segment.iter().map(|r| r.cycle));
    }
    assert_eq!(cycles, (0..400).collect::<Vec<_>>());

    let barrier = activity.barrier().unwrap();
    assert_eq!(barrier.floor(), 400);
    assert_eq!(barrier.await_completion().await.unwrap(), 400);
}

#[tokio::test]
async fn retries_are_bounded_then_fall_back() {
    let mut cfg = config(0, 200, 2);
    cfg.errors = "Overloaded:retry,count,-2;stop".into();
    cfg.max_tries = 3;

    let attempts: Arc<Mutex<HashMap<u64, u32>>> = Arc::default();
    let seen = Arc::clone(&attempts);
    let op = OpFn::arc("overloaded", move |cycle: u64| {
        *seen.lock().unwrap().entry(cycle).or_default() += 1;
        async move {
            if cycle % 10 == 0 {
                Err::<i8, _>(OperationFailure::new("Overloaded", "busy"))
            } else {
                Ok(0)
            }
        }
    });
    let sink = Arc::new(CollectingSink::new());
    let activity = ActivityBuilder::new(cfg, op)
        .with_sink(sink.clone())
        .build()
        .unwrap();
    let report = activity.run().await.unwrap();

    let attempts = attempts.lock().unwrap();
    for cycle in 0..200u64 {
        let expected = if cycle % 10 == 0 { 3 } else { 1 };
        assert_eq!(attempts[&cycle], expected, "cycle {cycle}");
    }
    assert_eq!(report.tries(), 240);
    assert_eq!(report.failures(), 20);

    let tally = activity.policy().tally();
    assert_eq!(tally.responses(Response::Retry), 40);
    assert_eq!(tally.responses(Response::Count), 20);
    assert_eq!(tally.count_for("Overloaded"), 60);
    assert_eq!(report.errors.total(), 60);

    assert!(
        sink.results()
            .iter()
            .filter(|r| r.cycle % 10 == 0)
            .all(|r| r.result == -2)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_response_halts_the_activity() {
    let mut cfg = config(0, 10_000, 4);
    cfg.errors = "Fatal:stop".into();

    let op = OpFn::arc("fatal-at-50", |cycle: u64| async move {
        if cycle == 50 {
            Err::<i8, _>(OperationFailure::new("Fatal", "boom"))
        } else {
            Ok(0)
        }
    });
    let activity = ActivityBuilder::new(cfg, op).build().unwrap();
    let err = activity.run().await.unwrap_err();

    assert!(matches!(err, RuntimeError::MotorErrored { cycle: 50, .. }));
    let snap = activity.snapshot();
    assert_eq!(snap.count(RunState::Errored), 1);
    assert_eq!(
        snap.count(RunState::Stopped) + snap.count(RunState::Finished),
        3
    );
    assert_eq!(snap.max_state(), Some(RunState::Errored));
    assert_eq!(activity.policy().tally().responses(Response::Stop), 1);

    let report = activity.report().expect("report of the halted run");
    assert_eq!(report.motors.len(), 4);
    assert_eq!(report.motor_errors().count(), 1);
    assert!(report.cycles() > 50);
}

#[tokio::test]
async fn replayed_cycles_do_not_move_the_checkpoint() {
    let mut cfg = config(0, 4, 2);
    cfg.recycles = 2;
    cfg.window_size = 4;
    cfg.bucket_width = 4;

    // The first dispense of cycle 0 holds until released; everything else is instant.
    let gate = Arc::new(tokio::sync::Notify::new());
    let held = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let op = {
        let gate = Arc::clone(&gate);
        OpFn::arc("slow-first-zero", move |cycle: u64| {
            let gate = Arc::clone(&gate);
            let hold = cycle == 0 && !held.swap(true, std::sync::atomic::Ordering::SeqCst);
            async move {
                if hold {
                    gate.notified().await;
                }
                Ok::<i8, OperationFailure>(0)
            }
        })
    };
    let activity = ActivityBuilder::new(cfg, op).build().unwrap();
    let runner = {
        let activity = Arc::clone(&activity);
        tokio::spawn(async move { activity.run().await })
    };

    // One motor holds pass-0 cycle 0; the other drains the rest, including pass-1 cycle 0.
    let snap = activity
        .await_any(&[RunState::Finished], Some(Duration::from_secs(5)))
        .await;
    assert!(!snap.is_timeout());
    assert_eq!(snap.count(RunState::Running), 1);
    assert_eq!(activity.checkpoint(), None);

    gate.notify_one();
    let report = runner.await.unwrap().unwrap();
    assert_eq!(report.cycles(), 8);
    assert_eq!(report.checkpoint, Some(3));
}

#[tokio::test]
async fn chained_handlers_warn_count_and_record_latency() {
    let mut cfg = config(0, 100, 2);
    cfg.errors = "Busy:warn,count,histogram,-4;stop".into();

    let op = OpFn::arc("busy-every-tenth", |cycle: u64| async move {
        if cycle % 10 == 3 {
            Err::<i8, _>(OperationFailure::new("Busy", "try later"))
        } else {
            Ok(0)
        }
    });
    let sink = Arc::new(CollectingSink::new());
    let activity = ActivityBuilder::new(cfg, op)
        .with_sink(sink.clone())
        .build()
        .unwrap();
    let report = activity.run().await.unwrap();

    assert!(report.snapshot.is_only(RunState::Finished));
    assert_eq!(report.failures(), 10);
    let tally = activity.policy().tally();
    assert_eq!(tally.responses(Response::Warn), 10);
    assert_eq!(tally.count_for("Busy"), 10);
    assert_eq!(tally.histogram_for("Busy").map(|h| h.count()), Some(10));
    assert_eq!(report.errors.total(), 10);
    assert!(
        sink.results()
            .iter()
            .filter(|r| r.cycle % 10 == 3)
            .all(|r| r.result == -4)
    );
}

#[tokio::test]
async fn errors_stay_in_the_report_without_halt() {
    let mut cfg = config(0, 100, 2);
    cfg.errors = "Fatal:stop".into();
    cfg.halt_on_error = false;

    let op = OpFn::arc("fatal-at-7", |cycle: u64| async move {
        if cycle == 7 {
            Err::<i8, _>(OperationFailure::new("Fatal", "boom"))
        } else {
            Ok(0)
        }
    });
    let activity = ActivityBuilder::new(cfg, op).build().unwrap();
    let report = activity.run().await.unwrap();

    assert_eq!(report.motor_errors().count(), 1);
    assert_eq!(report.snapshot.count(RunState::Errored), 1);
    assert_eq!(report.snapshot.count(RunState::Finished), 1);
    // The surviving motor drains the rest of the shared range.
    assert_eq!(report.cycles(), 100);
}

#[tokio::test(start_paused = true)]
async fn request_stop_finishes_claimed_work() {
    let cfg = config(0, 1_000, 2);
    let activity = ActivityBuilder::new(cfg, sleeper(Duration::from_millis(10)))
        .build()
        .unwrap();
    let mut events = activity.subscribe();

    let runner = {
        let activity = Arc::clone(&activity);
        tokio::spawn(async move { activity.run().await })
    };
    let snap = activity.await_any(&[RunState::Running], None).await;
    assert!(!snap.is_timeout());
    tokio::time::sleep(Duration::from_millis(55)).await;

    activity.request_stop();
    activity.request_stop();
    let report = runner.await.unwrap().unwrap();

    assert!(report.snapshot.is_only(RunState::Stopped));
    assert!(report.cycles() > 0 && report.cycles() < 1_000);

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::StopRequested).count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::MotorStopped).count(), 2);
    assert!(kinds.contains(&EventKind::AllStoppedWithin));
}

#[tokio::test(start_paused = true)]
async fn grace_exceeded_reports_stuck_motors() {
    let mut cfg = config(0, 10, 2);
    cfg.grace = Duration::from_millis(100);
    let activity = ActivityBuilder::new(cfg, sleeper(Duration::from_secs(3_600)))
        .build()
        .unwrap();

    let runner = {
        let activity = Arc::clone(&activity);
        tokio::spawn(async move { activity.run().await })
    };
    activity
        .await_none_of(&[RunState::Starting], None)
        .await;
    activity.request_stop();

    match runner.await.unwrap() {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec![0, 1]);
        }
        other => panic!("expected grace exceeded, got {other:?}"),
    }
    assert!(activity.snapshot().is_only(RunState::Errored));
}

#[tokio::test(start_paused = true)]
async fn controller_awaits_time_out_without_interrupting() {
    let cfg = config(0, 20, 2);
    let activity = ActivityBuilder::new(cfg, sleeper(Duration::from_millis(10)))
        .build()
        .unwrap();
    let runner = {
        let activity = Arc::clone(&activity);
        tokio::spawn(async move { activity.run().await })
    };

    let early = activity
        .await_none_other(&[RunState::Finished], Some(Duration::from_millis(15)))
        .await;
    assert!(early.is_timeout());
    assert!(!early.is_only(RunState::Finished));

    let done = activity
        .await_none_other(&[RunState::Finished], Some(Duration::from_secs(5)))
        .await;
    assert!(!done.is_timeout());
    assert!(done.is_only(RunState::Finished));

    let report = runner.await.unwrap().unwrap();
    assert_eq!(report.cycles(), 20);
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_is_classified() {
    let mut cfg = config(0, 10, 1);
    cfg.op_timeout = Duration::from_millis(20);
    cfg.errors = "Timeout:count;stop".into();

    let op = OpFn::arc("slow-odd", |cycle: u64| async move {
        if cycle % 2 == 1 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok::<i8, OperationFailure>(0)
    });
    let sink = Arc::new(CollectingSink::new());
    let activity = ActivityBuilder::new(cfg, op)
        .with_sink(sink.clone())
        .build()
        .unwrap();
    let report = activity.run().await.unwrap();

    assert_eq!(report.failures(), 5);
    assert_eq!(activity.policy().tally().count_for("Timeout"), 5);
    assert!(
        sink.results()
            .iter()
            .filter(|r| r.cycle % 2 == 1)
            .all(|r| r.result == cyclemotor::DEFAULT_FAILURE_CODE)
    );
}

#[tokio::test]
async fn subscribers_see_the_whole_run() {
    let recorder = Arc::new(Recorder::default());
    let mut cfg = config(0, 64, 2);
    cfg.window_size = 32;
    cfg.bucket_width = 8;

    let activity = ActivityBuilder::new(cfg, echo())
        .with_subscribers(vec![recorder.clone()])
        .build()
        .unwrap();
    activity.run().await.unwrap();

    assert_eq!(recorder.count(EventKind::ActivityStarting), 1);
    assert_eq!(recorder.count(EventKind::MotorStarting), 2);
    assert_eq!(recorder.count(EventKind::MotorRunning), 2);
    assert_eq!(recorder.count(EventKind::MotorFinished), 2);
    assert_eq!(recorder.count(EventKind::CheckpointAdvanced), 2);
    assert_eq!(recorder.count(EventKind::StopRequested), 0);
}
