//! # Operation abstraction.
//!
//! An [`Operation`] turns a cycle into a future that performs one attempt and yields a
//! result code or a classified [`OperationFailure`]. The engine calls
//! [`dispense`](Operation::dispense) once per attempt, so retries always get a fresh future.
//!
//! The common handle type is [`OperationRef`], an `Arc<dyn Operation>` shared by every motor
//! of an activity.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::OperationFailure;

/// Boxed future returned by [`Operation::dispense`].
pub type BoxOpFuture = Pin<Box<dyn Future<Output = Result<i8, OperationFailure>> + Send + 'static>>;

/// Shared handle to an operation.
pub type OperationRef = Arc<dyn Operation>;

/// # Cycle-to-work mapping.
///
/// Implementations must be pure with respect to the cycle: the same cycle always maps to
/// the same logical operation, whichever motor dispatches it.
///
/// # Example
/// ```
/// use cyclemotor::{BoxOpFuture, Operation, OperationFailure};
///
/// struct EvenOnly;
///
/// impl Operation for EvenOnly {
///     fn name(&self) -> &str { "even-only" }
///
///     fn dispense(&self, cycle: u64) -> BoxOpFuture {
///         Box::pin(async move {
///             if cycle % 2 == 0 {
///                 Ok(0)
///             } else {
///                 Err(OperationFailure::new("Odd", format!("cycle {cycle}")))
///             }
///         })
///     }
/// }
/// ```
pub trait Operation: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Creates the future for one attempt at `cycle`.
    fn dispense(&self, cycle: u64) -> BoxOpFuture;
}
