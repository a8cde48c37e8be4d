//! Descriptor - per-task control block
//!
//! Identity, stack ownership, timing metadata and queue linkage for one
//! task. A descriptor lives in exactly one place at any instant: one of
//! the three queues or the current slot. The [`Location`] tag makes that
//! residency explicit and checkable.

use bitflags::bitflags;

use crate::clock::TimePoint;
use crate::platform::{Context, TaskEntry};
use crate::process::table::ProcessId;

bitflags! {
    /// Scheduling class of a descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        /// Has an arrival time and absolute deadline, scheduled EDF.
        const REAL_TIME = 1 << 0;
        /// Re-armed with a fixed period after each completed instance.
        const PERIODIC  = 1 << 1;
    }
}

/// Where a descriptor currently resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Real-time, arrival not yet elapsed (ordered by arrival).
    NotReady,
    /// Real-time, eligible to run (ordered by deadline).
    Ready,
    /// Best-effort FIFO.
    Runnable,
    /// The single current slot.
    Current,
}

/// Per-task record.
///
/// Owns its stack block exclusively from admission until release (or
/// indefinitely under periodic re-arm). `original` is the block handle used
/// both to rebuild the initial frame and to release the memory; `context`
/// is wherever execution was last saved.
pub struct Descriptor {
    stack_size: usize,
    context: Context,
    original: Context,
    entry: TaskEntry,
    /// Intrusive link to the next descriptor in whatever queue holds this one.
    next: Option<ProcessId>,
    flags: DescriptorFlags,
    location: Location,
    arrival: TimePoint,
    deadline: TimePoint,
    /// Zero for aperiodic tasks.
    period: TimePoint,
}

impl Descriptor {
    /// Best-effort descriptor: no timing metadata, enters the runnable queue.
    pub fn best_effort(entry: TaskEntry, stack_size: usize, context: Context) -> Self {
        Self {
            stack_size,
            context,
            original: context,
            entry,
            next: None,
            flags: DescriptorFlags::empty(),
            location: Location::Runnable,
            arrival: TimePoint::ZERO,
            deadline: TimePoint::ZERO,
            period: TimePoint::ZERO,
        }
    }

    /// Real-time descriptor. `deadline` is already absolute; `period` is
    /// zero for aperiodic tasks.
    pub fn real_time(
        entry: TaskEntry,
        stack_size: usize,
        context: Context,
        arrival: TimePoint,
        deadline: TimePoint,
        period: TimePoint,
    ) -> Self {
        debug_assert!(arrival <= deadline);
        let mut flags = DescriptorFlags::REAL_TIME;
        if !period.is_zero() {
            flags |= DescriptorFlags::PERIODIC;
        }
        Self {
            stack_size,
            context,
            original: context,
            entry,
            next: None,
            flags,
            location: Location::NotReady,
            arrival,
            deadline,
            period,
        }
    }

    pub fn is_real_time(&self) -> bool {
        self.flags.contains(DescriptorFlags::REAL_TIME)
    }

    pub fn is_periodic(&self) -> bool {
        self.flags.contains(DescriptorFlags::PERIODIC)
    }

    pub fn flags(&self) -> DescriptorFlags {
        self.flags
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    /// Last saved execution context.
    pub fn context(&self) -> Context {
        self.context
    }

    /// Update the saved context after a preemption save or a re-arm rebuild.
    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// The original stack block, for rebuild and release.
    pub fn original_stack(&self) -> Context {
        self.original
    }

    pub fn arrival(&self) -> TimePoint {
        self.arrival
    }

    pub fn deadline(&self) -> TimePoint {
        self.deadline
    }

    pub fn period(&self) -> TimePoint {
        self.period
    }

    /// Advance arrival and deadline by one period. The deadline moves by
    /// the same period as the arrival, keeping their distance constant
    /// across every re-arm.
    pub fn advance_period(&mut self) {
        debug_assert!(self.is_periodic());
        self.arrival = self.arrival + self.period;
        self.deadline = self.deadline + self.period;
        debug_assert!(self.arrival <= self.deadline);
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn next(&self) -> Option<ProcessId> {
        self.next
    }

    pub fn set_next(&mut self, next: Option<ProcessId>) {
        self.next = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn aperiodic_real_time_has_no_periodic_flag() {
        let d = Descriptor::real_time(
            noop,
            128,
            Context::new(1),
            TimePoint::new(0, 0),
            TimePoint::new(2, 0),
            TimePoint::ZERO,
        );
        assert!(d.is_real_time());
        assert!(!d.is_periodic());
    }

    #[test]
    fn periodic_rearm_keeps_deadline_offset() {
        let mut d = Descriptor::real_time(
            noop,
            128,
            Context::new(1),
            TimePoint::new(0, 1),
            TimePoint::new(10, 1),
            TimePoint::new(10, 0),
        );
        let offset = d.deadline().as_millis() - d.arrival().as_millis();
        d.advance_period();
        assert_eq!(d.arrival(), TimePoint::new(10, 1));
        assert_eq!(d.deadline(), TimePoint::new(20, 1));
        assert_eq!(d.deadline().as_millis() - d.arrival().as_millis(), offset);
    }

    #[test]
    fn best_effort_owns_its_original_stack() {
        let d = Descriptor::best_effort(noop, 256, Context::new(7));
        assert_eq!(d.context(), d.original_stack());
        assert_eq!(d.location(), Location::Runnable);
    }
}
