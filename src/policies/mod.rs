//! Failure handling policies.
//!
//! This module groups the knobs that decide **what happens** when an operation fails and
//! **how long** to wait before trying the same cycle again.
//!
//! ## Contents
//! - [`Response`] severity-ordered reaction to a failure (ignore … stop)
//! - [`ErrorPolicy`] ordered classifier → response table, retry bound, metrics
//! - [`ErrorTally`] per-response and per-classifier failure metrics
//! - [`RetryBackoff`] delay between retries (first / factor / max)
//!
//! ## Quick wiring
//! ```text
//! ActivityConfig { errors: "…", max_tries, retry_backoff }
//!      └─► core::runner::run_cycle uses:
//!           - policy.handle(failure, cycle, attempt) to pick Retry / Continue / Stop
//!           - retry_backoff.next(retry) to pause before the next attempt
//! ```
//!
//! ## Defaults
//! - `ErrorPolicy::default()` → one catch-all `stop` rule, max tries 10.
//! - `RetryBackoff::default()` → immediate retries.

mod error_policy;
mod metrics;
mod response;
mod retry;

pub use error_policy::{DEFAULT_FAILURE_CODE, DEFAULT_MAX_TRIES, ErrorPolicy, ErrorRule, Verdict};
pub use metrics::{ErrorSummary, ErrorTally, LatencyHistogram};
pub use response::Response;
pub use retry::RetryBackoff;
