//! Activity core: the controller and its motors.
//!
//! The public API from this module is [`Activity`] (built through [`ActivityBuilder`]),
//! its [`ActivityConfig`] and the reports it returns.
//!
//! Internal modules:
//! - [`context`]: per-activity state shared with every motor;
//! - [`runner`]: runs one cycle through attempts, retries and the error policy;
//! - [`motor`]: the claim → dispatch → record loop of one worker;
//! - [`activity`]: spawns motors, handles stop requests, signals and grace;
//! - [`shutdown`]: cross-platform stop signal handling.

mod activity;
mod builder;
mod config;
mod context;
mod motor;
mod runner;
mod shutdown;

pub use activity::{Activity, ActivityReport};
pub use builder::ActivityBuilder;
pub use config::ActivityConfig;
pub use motor::MotorReport;
