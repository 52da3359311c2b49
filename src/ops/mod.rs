//! Operation layer boundary.
//!
//! - [`Operation`]: maps a cycle to one attempt's future.
//! - [`OpFn`]: closure-backed implementation.
//! - [`OperationRef`]: shared handle (`Arc<dyn Operation>`).

mod op_fn;
mod operation;

pub use op_fn::OpFn;
pub use operation::{BoxOpFuture, Operation, OperationRef};
