//! Activity events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish/subscribe to
//! events emitted by the activity controller, its motors and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Activity`, `Motor`, `core::runner::run_cycle`, `SubscriberSet` workers
//!   (overflow/panic).
//! - **Consumers**: the activity's fan-out listener, which feeds the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
