//! # Example: flaky_activity
//!
//! Runs an activity whose operation fails now and then, showing how the
//! [`ErrorPolicy`] resolves each failure and how results reach the sink in cycle order.
//!
//! Every 17th cycle reports `Overloaded` once (retried, then succeeds), every 50th
//! reports `Mismatch` (counted and skipped), and the first cycle above 900 that is a
//! multiple of 97 raises `Fatal`, which halts its motor and stops the activity.
//!
//! ## Flow
//! ```text
//! Activity::run()
//!   ├─► spawn motors 0..4 (Starting → Running)
//!   ├─► motor claims segment [s, s+stride)
//!   │     ├─► op(cycle) → Err(Overloaded) → retry after backoff → Ok
//!   │     ├─► op(cycle) → Err(Mismatch)   → count, result = 127
//!   │     └─► barrier.await_and_run(s, s+stride) → sink
//!   ├─► op(970) → Err(Fatal) → stop → motor Errored
//!   ├─► request stop (other motors finish their claimed segment)
//!   └─► ActivityReport { snapshot, errors, checkpoint }
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example flaky_activity
//! ```

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use cyclemotor::{
    ActivityBuilder, ActivityConfig, CollectingSink, LogWriter, OpFn, OperationFailure,
    RetryBackoff, RuntimeError, Subscribe,
};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cyclemotor=info".into()),
        )
        .with_target(false)
        .init();

    // 1. Configure a 4-motor ordered run over 0..1000
    let mut cfg = ActivityConfig::for_range(0, 1_000);
    cfg.name = "flaky".into();
    cfg.motors = 4;
    cfg.stride = 10;
    cfg.ordered = true;
    cfg.errors = "Overloaded:retry,count;Mismatch:count;Fatal:stop".into();
    cfg.retry_backoff = RetryBackoff::constant(Duration::from_millis(5));
    cfg.grace = Duration::from_secs(5);

    // 2. Overloaded is transient: each cycle fails once, then succeeds
    let overloaded = Arc::new(Mutex::new(HashSet::new()));
    let op = OpFn::arc("flaky", move |cycle: u64| {
        let overloaded = Arc::clone(&overloaded);
        async move {
            if cycle % 17 == 0 && overloaded.lock().unwrap().insert(cycle) {
                return Err(OperationFailure::new("Overloaded", format!("cycle {cycle}")));
            }
            if cycle > 900 && cycle % 97 == 0 {
                return Err(OperationFailure::new("Fatal", "corrupted response"));
            }
            if cycle % 50 == 0 {
                return Err(OperationFailure::new("Mismatch", "unexpected row count"));
            }
            tokio::time::sleep(Duration::from_micros(200)).await;
            Ok::<i8, OperationFailure>(0)
        }
    });

    // 3. Collect results and log lifecycle events
    let sink = Arc::new(CollectingSink::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let activity = ActivityBuilder::new(cfg, op)
        .with_sink(sink.clone())
        .with_subscribers(subs)
        .build()?;

    // 4. Run; the Fatal cycle halts the activity
    match activity.run().await {
        Ok(report) => println!("[flaky] finished: {}", report.snapshot),
        Err(RuntimeError::MotorErrored { motor, cycle, error }) => {
            println!("[flaky] motor {motor} halted at cycle {cycle}: {error}")
        }
        Err(e) => return Err(e.into()),
    }

    // 5. Inspect what was recorded
    let summary = activity.error_summary();
    println!("[flaky] state: {}", activity.snapshot());
    if let Some(report) = activity.report() {
        println!(
            "[flaky] {} cycles in {} tries over {:?}",
            report.cycles(),
            report.tries(),
            report.elapsed
        );
    }
    println!("[flaky] failures handled: {}", summary.total());
    for (classifier, n) in &summary.counters {
        println!("[flaky]   {classifier}: {n}");
    }

    let results = sink.results();
    let ordered = results.windows(2).all(|w| w[0].cycle < w[1].cycle);
    println!(
        "[flaky] {} results delivered, in cycle order: {ordered}, checkpoint: {:?}",
        results.len(),
        activity.checkpoint()
    );
    Ok(())
}
