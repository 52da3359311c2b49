//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing an activity; [`SubscriberSet`] fans
//! bus events out to subscribers, each behind its own bounded queue and worker.
//!
//! ```text
//!   Motor ── publish(Event) ──► Bus ──► Activity listener ──► SubscriberSet
//!                                                                 │
//!                                                   ┌─────────────┼──────────┐
//!                                                   ▼             ▼          ▼
//!                                               LogWriter      Metrics     Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
