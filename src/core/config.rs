//! # Activity configuration.
//!
//! Provides [`ActivityConfig`], the settings consumed when building an
//! [`Activity`](crate::Activity).
//!
//! ## Sentinel values
//! - `op_timeout = 0s` → attempts run without a timeout
//! - `grace = 0s` → motors still running at stop are aborted immediately
//! - `recycles = 0` → treated as 1

use std::time::Duration;

use crate::cycles::{CycleRange, SourceMode};
use crate::error::ConfigError;
use crate::policies::{DEFAULT_MAX_TRIES, ErrorPolicy, RetryBackoff};
use crate::tracking::WindowShape;

/// Settings for one activity.
///
/// ## Field semantics
/// - `start`/`end`: half-open cycle range `[start, end)`
/// - `motors`: number of concurrent motors (min 1)
/// - `stride`: cycles claimed per segment (min 1, at most `window_size`)
/// - `source`: one shared cursor, or one pre-sliced stripe per motor
/// - `errors`: error policy spec, e.g. `"Overloaded:retry,warn;Timeout:count;stop"`
/// - `ordered`: deliver segments to the sink in ascending cycle order
/// - `track_progress`: keep a pool-wide checkpoint ledger
/// - `halt_on_error`: stop the remaining motors when one resolves a failure to `stop`
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug)]
pub struct ActivityConfig {
    /// Name used in events and logs.
    pub name: String,
    /// First cycle (inclusive).
    pub start: u64,
    /// Last cycle (exclusive).
    pub end: u64,
    /// How many times the range is walked (`0` = once).
    pub recycles: u64,
    /// Number of motors.
    pub motors: usize,
    /// Cycles claimed per segment.
    pub stride: u64,
    /// Cycle allocation mode.
    pub source: SourceMode,
    /// Completion window size (cycles).
    pub window_size: u64,
    /// Completion bucket width (bits per inner word, max 64).
    pub bucket_width: u32,
    /// Entries per result segment.
    pub buffer_capacity: usize,
    /// Error policy spec string.
    pub errors: String,
    /// Attempts per cycle before `retry` escalates.
    pub max_tries: u32,
    /// Delay between retry attempts.
    pub retry_backoff: RetryBackoff,
    /// Per-attempt timeout (`0s` = none).
    pub op_timeout: Duration,
    /// Deliver result segments to the sink in ascending order.
    pub ordered: bool,
    /// Maintain the pool-wide checkpoint.
    pub track_progress: bool,
    /// Stop every motor once one motor errors.
    pub halt_on_error: bool,
    /// Maximum wait for motors after a stop request.
    pub grace: Duration,
    /// Capacity of the event bus ring buffer.
    pub bus_capacity: usize,
    /// Request a stop on SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    pub handle_signals: bool,
}

impl ActivityConfig {
    /// Default configuration over `[start, end)`.
    pub fn for_range(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// The cycle range.
    ///
    /// # Errors
    /// [`ConfigError::InvalidRange`] when `start > end`.
    pub fn range(&self) -> Result<CycleRange, ConfigError> {
        CycleRange::new(self.start, self.end)
    }

    /// Completion window geometry.
    ///
    /// # Errors
    /// [`ConfigError::InvalidWindow`] for unrepresentable geometry.
    pub fn window(&self) -> Result<WindowShape, ConfigError> {
        WindowShape::new(self.window_size, self.bucket_width)
    }

    /// Parsed error policy with `max_tries` applied.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPolicy`] or [`ConfigError::InvalidPattern`].
    pub fn policy(&self) -> Result<ErrorPolicy, ConfigError> {
        Ok(ErrorPolicy::parse(&self.errors)?.with_max_tries(self.max_tries))
    }

    /// Per-attempt timeout as an `Option`.
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        if self.op_timeout.is_zero() {
            None
        } else {
            Some(self.op_timeout)
        }
    }

    /// Replay count clamped to a minimum of 1.
    #[inline]
    pub fn recycles_clamped(&self) -> u64 {
        self.recycles.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks every setting without building anything.
    ///
    /// # Errors
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.range()?;
        let shape = self.window()?;
        if self.motors == 0 {
            return Err(ConfigError::ZeroMotors);
        }
        if self.stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if self.stride > shape.size() {
            return Err(ConfigError::InvalidWindow {
                size: self.window_size,
                bucket_width: self.bucket_width,
                reason: "stride exceeds window size",
            });
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.ordered && self.source == SourceMode::Striped {
            return Err(ConfigError::Conflict {
                reason: "ordered output requires a shared cycle source",
            });
        }
        self.policy()?;
        Ok(())
    }
}

impl Default for ActivityConfig {
    /// Default configuration:
    ///
    /// - empty range `[0, 0)`, one pass, one motor, stride 1, shared source
    /// - window 1024 cycles in buckets of 32, result segments of 1024 entries
    /// - `errors = "stop"`, `max_tries = 10`, immediate retries, no attempt timeout
    /// - unordered output, progress tracking on, halt on error
    /// - `grace = 60s`, `bus_capacity = 1024`, signal handling on
    fn default() -> Self {
        Self {
            name: "activity".to_string(),
            start: 0,
            end: 0,
            recycles: 1,
            motors: 1,
            stride: 1,
            source: SourceMode::Shared,
            window_size: 1024,
            bucket_width: 32,
            buffer_capacity: 1024,
            errors: "stop".to_string(),
            max_tries: DEFAULT_MAX_TRIES,
            retry_backoff: RetryBackoff::default(),
            op_timeout: Duration::ZERO,
            ordered: false,
            track_progress: true,
            halt_on_error: true,
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            handle_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_validates() {
        let cfg = ActivityConfig::for_range(0, 100);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.attempt_timeout(), None);
        assert_eq!(cfg.policy().unwrap().max_tries(), DEFAULT_MAX_TRIES);
    }

    #[test]
    fn rejects_bad_settings() {
        let mut cfg = ActivityConfig::for_range(10, 5);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRange { .. })));

        cfg = ActivityConfig::for_range(0, 10);
        cfg.motors = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroMotors)));

        cfg = ActivityConfig::for_range(0, 10);
        cfg.stride = 2048;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidWindow { .. })));

        cfg = ActivityConfig::for_range(0, 10);
        cfg.ordered = true;
        cfg.source = SourceMode::Striped;
        assert!(matches!(cfg.validate(), Err(ConfigError::Conflict { .. })));

        cfg = ActivityConfig::for_range(0, 10);
        cfg.errors = "Nope:explode".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPolicy { .. })));
    }

    #[test]
    fn sentinels() {
        let mut cfg = ActivityConfig::default();
        cfg.recycles = 0;
        cfg.bus_capacity = 0;
        cfg.op_timeout = Duration::from_millis(5);
        assert_eq!(cfg.recycles_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.attempt_timeout(), Some(Duration::from_millis(5)));
    }
}
