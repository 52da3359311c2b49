//! Error types used by the cyclemotor runtime and by operations.
//!
//! This module defines three error enums:
//!
//! - [`ConfigError`] — invalid construction-time input (ranges, windows, policy tables).
//! - [`OperationFailure`] — failures raised by the operation layer during a cycle attempt.
//! - [`RuntimeError`] — failures surfaced by the activity controller itself.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Controller-side await timeouts are **not** errors: they are reported through
//! [`RunStateSnapshot::is_timeout`](crate::RunStateSnapshot::is_timeout).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Construction-time configuration errors.
///
/// Raised immediately when a component is built with invalid parameters.
/// There is no retry and no partial startup.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Cycle range with `start > end`.
    #[error("invalid cycle range [{start}, {end}): start is after end")]
    InvalidRange {
        /// Inclusive start.
        start: u64,
        /// Exclusive end.
        end: u64,
    },

    /// Completion window geometry that cannot be represented.
    #[error("invalid completion window: size={size} bucket_width={bucket_width}: {reason}")]
    InvalidWindow {
        /// Requested window size.
        size: u64,
        /// Requested bucket width.
        bucket_width: u32,
        /// Why the geometry was rejected.
        reason: &'static str,
    },

    /// Error policy table that could not be parsed.
    #[error("invalid error policy '{spec}': {reason}")]
    InvalidPolicy {
        /// The offending rule text.
        spec: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Classifier pattern that is not a valid regular expression.
    #[error("invalid classifier pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Cycle outside the bounds of a completion window.
    #[error("cycle {cycle} is outside window [{base}, {end})")]
    OutOfWindow {
        /// The rejected cycle.
        cycle: u64,
        /// Window base.
        base: u64,
        /// Exclusive window end.
        end: u64,
    },

    /// Barrier range whose start is already behind the floor.
    #[error("range starting at {start} is behind barrier floor {floor}")]
    StaleRange {
        /// Range start.
        start: u64,
        /// Floor observed when the range was rejected.
        floor: u64,
    },

    /// Barrier state is no longer observable.
    #[error("sequence barrier closed")]
    BarrierClosed,

    /// Activity configured with zero motors.
    #[error("motor count must be at least 1")]
    ZeroMotors,

    /// Buffer configured with zero capacity.
    #[error("result buffer capacity must be at least 1")]
    ZeroCapacity,

    /// Claims configured with zero stride.
    #[error("stride must be at least 1")]
    ZeroStride,

    /// Settings that cannot be combined.
    #[error("conflicting settings: {reason}")]
    Conflict {
        /// Which settings clash.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::ConfigError;
    ///
    /// let err = ConfigError::InvalidRange { start: 10, end: 5 };
    /// assert_eq!(err.as_label(), "config_invalid_range");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidRange { .. } => "config_invalid_range",
            ConfigError::InvalidWindow { .. } => "config_invalid_window",
            ConfigError::InvalidPolicy { .. } => "config_invalid_policy",
            ConfigError::InvalidPattern { .. } => "config_invalid_pattern",
            ConfigError::OutOfWindow { .. } => "config_out_of_window",
            ConfigError::StaleRange { .. } => "config_stale_range",
            ConfigError::BarrierClosed => "config_barrier_closed",
            ConfigError::ZeroMotors => "config_zero_motors",
            ConfigError::ZeroCapacity => "config_zero_capacity",
            ConfigError::ZeroStride => "config_zero_stride",
            ConfigError::Conflict { .. } => "config_conflict",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Failures raised by the operation layer.
///
/// Every failure carries a classifier string which the
/// [`ErrorPolicy`](crate::ErrorPolicy) matches against its rule table.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum OperationFailure {
    /// The operation failed mechanically.
    #[error("{classifier}: {message}")]
    Failed {
        /// Classifier name used for policy matching (e.g. `"WriteTimeout"`).
        classifier: Arc<str>,
        /// Failure details.
        message: String,
    },

    /// The operation succeeded but its result failed an external check.
    #[error("verification failed: {message}")]
    Verification {
        /// Verification details.
        message: String,
    },

    /// The attempt exceeded its configured timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl OperationFailure {
    /// Creates a classified failure.
    pub fn new(classifier: impl Into<Arc<str>>, message: impl Into<String>) -> Self {
        OperationFailure::Failed {
            classifier: classifier.into(),
            message: message.into(),
        }
    }

    /// Creates a verification failure.
    pub fn verification(message: impl Into<String>) -> Self {
        OperationFailure::Verification {
            message: message.into(),
        }
    }

    /// Returns the name the error policy matches against.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::OperationFailure;
    ///
    /// assert_eq!(OperationFailure::new("Overloaded", "busy").classifier(), "Overloaded");
    /// assert_eq!(OperationFailure::verification("bad row").classifier(), "VerificationFailure");
    /// ```
    pub fn classifier(&self) -> &str {
        match self {
            OperationFailure::Failed { classifier, .. } => classifier,
            OperationFailure::Verification { .. } => "VerificationFailure",
            OperationFailure::Timeout { .. } => "Timeout",
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationFailure::Failed { .. } => "operation_failed",
            OperationFailure::Verification { .. } => "operation_verification",
            OperationFailure::Timeout { .. } => "operation_timeout",
        }
    }

    /// Returns a human-readable message with details about the failure.
    pub fn as_message(&self) -> String {
        match self {
            OperationFailure::Failed {
                classifier,
                message,
            } => format!("{classifier}: {message}"),
            OperationFailure::Verification { message } => format!("verification: {message}"),
            OperationFailure::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// True for failures of the verification subtype.
    pub fn is_verification(&self) -> bool {
        matches!(self, OperationFailure::Verification { .. })
    }
}

/// # Errors surfaced by the activity controller.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// The activity could not be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A motor resolved a failure to `stop` and entered `Errored`.
    #[error("motor {motor} errored at cycle {cycle}: {error}")]
    MotorErrored {
        /// Slot id of the motor.
        motor: usize,
        /// Cycle that produced the failure.
        cycle: u64,
        /// The failure that halted the motor.
        error: OperationFailure,
    },

    /// A motor task panicked.
    #[error("motor {motor} panicked")]
    MotorPanicked {
        /// Slot id of the motor.
        motor: usize,
    },

    /// [`Activity::run`](crate::Activity::run) was called a second time.
    #[error("activity already ran")]
    AlreadyRan,

    /// Stop grace period was exceeded; remaining motors were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck motors: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Slot ids of motors that did not reach a terminal state in time.
        stuck: Vec<usize>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(_) => "runtime_config",
            RuntimeError::MotorErrored { .. } => "runtime_motor_errored",
            RuntimeError::MotorPanicked { .. } => "runtime_motor_panicked",
            RuntimeError::AlreadyRan => "runtime_already_ran",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Config(e) => e.as_message(),
            RuntimeError::MotorErrored {
                motor,
                cycle,
                error,
            } => format!("motor={motor} cycle={cycle} {}", error.as_message()),
            RuntimeError::MotorPanicked { motor } => format!("motor={motor} panicked"),
            RuntimeError::AlreadyRan => "activity already ran".to_string(),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck motors={stuck:?}")
            }
        }
    }
}
