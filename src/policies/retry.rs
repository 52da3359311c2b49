//! # Delay between retry attempts of one cycle.
//!
//! [`RetryBackoff`] controls how long a motor pauses before re-dispatching a cycle whose
//! failure resolved to `retry`:
//! - [`RetryBackoff::first`] the delay before the first retry;
//! - [`RetryBackoff::factor`] the multiplicative growth factor;
//! - [`RetryBackoff::max`] the delay cap.
//!
//! The delay for retry `n` (0-indexed) is `first × factor^n`, clamped to `max`. The default
//! is no delay at all.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use cyclemotor::RetryBackoff;
//!
//! let backoff = RetryBackoff {
//!     first: Duration::from_millis(10),
//!     max: Duration::from_millis(50),
//!     factor: 2.0,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(10));
//! assert_eq!(backoff.next(1), Duration::from_millis(20));
//! assert_eq!(backoff.next(5), Duration::from_millis(50));
//! assert!(RetryBackoff::default().is_none());
//! ```

use std::time::Duration;

/// Retry delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for RetryBackoff {
    /// Immediate retries: `first = 0`, `max = 1s`, `factor = 1.0`.
    fn default() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::from_secs(1),
            factor: 1.0,
        }
    }
}

impl RetryBackoff {
    /// Constant delay between retries.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
        }
    }

    /// True if every retry is immediate.
    pub fn is_none(&self) -> bool {
        self.first.is_zero() || self.max.is_zero()
    }

    /// Computes the delay before retry `retry` (0-indexed).
    pub fn next(&self, retry: u32) -> Duration {
        if self.is_none() {
            return Duration::ZERO;
        }
        let max_secs = self.max.as_secs_f64();
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
