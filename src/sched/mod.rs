//! Scheduler subsystem
//!
//! Three-queue EDF core: the owning [`Scheduler`] context, the single
//! decision function, admission, and deadline accounting.

pub mod core;
pub mod error;
pub mod stats;

pub use self::core::{Scheduler, SchedulerConfig, SchedulerSnapshot};
pub use error::SchedulerError;
pub use stats::DeadlineStats;
