//! tempo-rt — preemptive EDF scheduling core
//!
//! Multiplexes best-effort and real-time tasks (periodic and aperiodic,
//! each with an absolute deadline) onto a single execution context.
//! Real-time work is earliest-deadline-first; everything else is FIFO.
//! Deadlines are observed and accounted, never enforced by killing a task.
//!
//! The core is portable: everything hardware-specific (initial stack
//! frames, the first context transfer, the tick interrupt sources) sits
//! behind [`platform::Platform`]. On hardware, wire:
//!
//! - a 1 kHz interrupt to [`clock::Clock::tick`] (strictly higher priority
//!   than the scheduling tick, so time advances mid-decision)
//! - the scheduling tick to save the running context and call
//!   [`sched::Scheduler::reschedule`] with it
//! - the completion trampoline to call `reschedule(None)`
//!
//! and restore whatever context `reschedule` returns. On the host, the
//! test suite plays all three roles directly against
//! [`platform::sim::SimPlatform`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock;
pub mod platform;
pub mod process;
pub mod queue;
pub mod sched;

// Re-exports
pub use clock::{Clock, TimePoint};
pub use platform::{Context, Platform, TaskEntry};
pub use process::ProcessId;
pub use sched::{DeadlineStats, Scheduler, SchedulerConfig, SchedulerError, SchedulerSnapshot};
