//! # Function-backed operation (`OpFn`)
//!
//! [`OpFn`] wraps a closure `F: Fn(u64) -> Fut`, producing a fresh future per attempt.
//! State shared between attempts or motors has to be captured explicitly (e.g. `Arc<...>`).
//!
//! ## Example
//! ```rust
//! use cyclemotor::{OpFn, OperationFailure, OperationRef};
//!
//! let op: OperationRef = OpFn::arc("noop", |_cycle: u64| async { Ok::<i8, OperationFailure>(0) });
//! assert_eq!(op.name(), "noop");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use super::operation::{BoxOpFuture, Operation};
use crate::error::OperationFailure;

/// Function-backed operation.
#[derive(Debug)]
pub struct OpFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OpFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OpFn::arc`] when you immediately need an [`OperationRef`](super::OperationRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Operation for OpFn<F>
where
    F: Fn(u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<i8, OperationFailure>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dispense(&self, cycle: u64) -> BoxOpFuture {
        Box::pin((self.f)(cycle))
    }
}
