//! # Activity builder.
//!
//! Collects the operation, optional sink, subscribers and an optional pre-built error
//! policy, then validates the configuration and wires the [`Activity`].

use std::sync::Arc;

use super::activity::Activity;
use super::config::ActivityConfig;
use crate::error::ConfigError;
use crate::ops::OperationRef;
use crate::policies::ErrorPolicy;
use crate::results::Sink;
use crate::subscribers::Subscribe;

/// Builder for an [`Activity`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use cyclemotor::{ActivityBuilder, ActivityConfig, CollectingSink, OpFn, OperationFailure, LogWriter};
///
/// let mut cfg = ActivityConfig::for_range(0, 100);
/// cfg.motors = 4;
/// cfg.handle_signals = false;
///
/// let op = OpFn::arc("noop", |_cycle: u64| async { Ok::<i8, OperationFailure>(0) });
/// let activity = ActivityBuilder::new(cfg, op)
///     .with_sink(Arc::new(CollectingSink::new()))
///     .with_subscribers(vec![Arc::new(LogWriter::new())])
///     .build()
///     .unwrap();
/// assert_eq!(activity.snapshot().total(), 4);
/// ```
pub struct ActivityBuilder {
    cfg: ActivityConfig,
    op: OperationRef,
    sink: Option<Arc<dyn Sink>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    policy: Option<ErrorPolicy>,
}

impl ActivityBuilder {
    /// Creates a builder running `op` under `cfg`.
    pub fn new(cfg: ActivityConfig, op: OperationRef) -> Self {
        Self {
            cfg,
            op,
            sink: None,
            subscribers: Vec::new(),
            policy: None,
        }
    }

    /// Sends result segments (and checkpoints) to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets event subscribers. Each gets its own bounded queue and worker.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `policy` instead of parsing `cfg.errors`.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Validates the configuration and builds the activity.
    ///
    /// Motors are registered in `Starting`; nothing runs until [`Activity::run`].
    ///
    /// # Errors
    /// The first [`ConfigError`] found; nothing is partially started.
    pub fn build(self) -> Result<Arc<Activity>, ConfigError> {
        let activity = Activity::new(
            self.cfg,
            self.op,
            self.sink,
            self.subscribers,
            self.policy,
        )?;
        Ok(Arc::new(activity))
    }
}
