//! Scheduler core - the decision function
//!
//! One owning context holds the clock, the process table, the three
//! queues, the current slot and the deadline counters, and is passed by
//! exclusive reference into every operation. That makes the critical
//! sections explicit: on hardware the interrupt glue serializes entry,
//! on the host the tests simply call in.
//!
//! [`Scheduler::reschedule`] is invoked at exactly two kinds of events,
//! distinguished by the saved-context argument:
//!
//! - preemption: the scheduling tick saves the running task's context and
//!   passes it in (`Some`)
//! - completion: the trampoline planted as the task's return address
//!   passes `None`
//!
//! It promotes arrived tasks, retires or requeues the previously-current
//! one, selects ready (earliest deadline) > runnable (FIFO) > not-ready
//! (busy-wait), and returns the context to resume.

use crate::clock::{Clock, TimePoint};
use crate::platform::{Context, Platform, TaskEntry};
use crate::process::{Descriptor, Location, ProcessId, ProcessTable};
use crate::queue::{Fifo, Ordered, SortKey};
use crate::sched::error::SchedulerError;
use crate::sched::stats::DeadlineStats;

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Upper bound on live descriptors.
    pub max_processes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_processes: 32 }
    }
}

/// The scheduling engine.
pub struct Scheduler<P: Platform> {
    platform: P,
    clock: Clock,
    table: ProcessTable,
    /// Best-effort tasks, admission order.
    runnable: Fifo,
    /// Real-time tasks eligible to run, earliest deadline first.
    ready: Ordered,
    /// Real-time tasks whose arrival has not elapsed, earliest arrival first.
    not_ready: Ordered,
    current: Option<ProcessId>,
    stats: DeadlineStats,
}

impl<P: Platform> Scheduler<P> {
    pub fn new(platform: P) -> Self {
        Self::with_config(platform, SchedulerConfig::default())
    }

    pub fn with_config(platform: P, config: SchedulerConfig) -> Self {
        Self {
            platform,
            clock: Clock::new(),
            table: ProcessTable::new(config.max_processes),
            runnable: Fifo::new(),
            ready: Ordered::new(SortKey::Deadline),
            not_ready: Ordered::new(SortKey::Arrival),
            current: None,
            stats: DeadlineStats::new(),
        }
    }

    /// The scheduler clock. `clock().tick()` is what the 1 kHz interrupt
    /// (or the test harness) calls.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn stats(&self) -> &DeadlineStats {
        &self.stats
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn current(&self) -> Option<ProcessId> {
        self.current
    }

    /// Admit a best-effort task. Enters the runnable queue.
    pub fn create(
        &mut self,
        entry: TaskEntry,
        stack_size: usize,
    ) -> Result<ProcessId, SchedulerError> {
        let context = self.alloc_stack(entry, stack_size)?;
        let descriptor = Descriptor::best_effort(entry, stack_size, context);
        let id = self.admit(descriptor);
        self.runnable.push(&mut self.table, id);
        log::debug!("admitted best-effort task {id} (stack {stack_size}B)");
        Ok(id)
    }

    /// Admit an aperiodic real-time task. The absolute deadline is
    /// `start + deadline`; the task enters the not-ready queue and is
    /// promoted once the clock reaches `start`.
    pub fn create_rt(
        &mut self,
        entry: TaskEntry,
        stack_size: usize,
        start: TimePoint,
        deadline: TimePoint,
    ) -> Result<ProcessId, SchedulerError> {
        self.create_real_time(entry, stack_size, start, deadline, TimePoint::ZERO)
    }

    /// Admit a periodic real-time task: as [`create_rt`], re-armed with
    /// `period` after each completed instance. `period` must be non-zero.
    ///
    /// [`create_rt`]: Scheduler::create_rt
    pub fn create_periodic(
        &mut self,
        entry: TaskEntry,
        stack_size: usize,
        start: TimePoint,
        deadline: TimePoint,
        period: TimePoint,
    ) -> Result<ProcessId, SchedulerError> {
        debug_assert!(!period.is_zero(), "periodic task with zero period");
        self.create_real_time(entry, stack_size, start, deadline, period)
    }

    fn create_real_time(
        &mut self,
        entry: TaskEntry,
        stack_size: usize,
        start: TimePoint,
        deadline: TimePoint,
        period: TimePoint,
    ) -> Result<ProcessId, SchedulerError> {
        let context = self.alloc_stack(entry, stack_size)?;
        let absolute = start + deadline;
        let descriptor =
            Descriptor::real_time(entry, stack_size, context, start, absolute, period);
        let id = self.admit(descriptor);
        self.not_ready.insert(&mut self.table, id);
        log::debug!("admitted real-time task {id} (arrival {start}, deadline {absolute})");
        Ok(id)
    }

    /// Atomic admission: reject before touching platform state, so a
    /// failure leaves neither a descriptor nor a stack behind.
    fn alloc_stack(
        &mut self,
        entry: TaskEntry,
        stack_size: usize,
    ) -> Result<Context, SchedulerError> {
        if self.table.is_full() {
            return Err(SchedulerError::DescriptorExhausted {
                live: self.table.live(),
                max: self.table.capacity(),
            });
        }
        self.platform
            .stack_init(entry, stack_size)
            .ok_or(SchedulerError::StackExhausted {
                requested: stack_size,
            })
    }

    fn admit(&mut self, descriptor: Descriptor) -> ProcessId {
        match self.table.insert(descriptor) {
            Some(id) => id,
            // alloc_stack already checked capacity under the same borrow.
            None => unreachable!("table filled up mid-admission"),
        }
    }

    /// The scheduling decision, executed under queue mutual exclusion.
    ///
    /// `saved` is the preempted task's execution context, or `None` when
    /// the previously-current task ran to completion. Returns the context
    /// to restore, or `None` when no task is left to run.
    pub fn reschedule(&mut self, saved: Option<Context>) -> Option<Context> {
        self.promote();
        match saved {
            None => self.retire_current(),
            Some(context) => self.requeue_current(context),
        }
        self.select()
    }

    /// Move every task whose arrival has elapsed from not-ready to ready.
    fn promote(&mut self) {
        let now = self.clock.now().as_millis();
        while let Some(arrival) = self.not_ready.head_key(&self.table) {
            if arrival > now {
                break;
            }
            if let Some(id) = self.not_ready.pop(&mut self.table) {
                log::trace!("task {id} arrived, promoting to ready");
                self.ready.insert(&mut self.table, id);
            }
        }
    }

    /// Completion: account the deadline, then re-arm (periodic) or
    /// release (aperiodic / best-effort) the previously-current task.
    fn retire_current(&mut self) {
        let Some(id) = self.current.take() else {
            // Completion event before any task was ever selected.
            return;
        };
        let now = self.clock.now();
        let descriptor = self.table.get(id);

        if descriptor.is_real_time() {
            if now <= descriptor.deadline() {
                log::debug!("task {id} completed at {now}, deadline met");
                self.stats.record_met();
            } else {
                log::debug!(
                    "task {id} completed at {now}, missed deadline {}",
                    descriptor.deadline()
                );
                self.stats.record_miss();
            }
        }

        if descriptor.is_periodic() {
            // Rebuild the initial frame on the same stack block, discarding
            // this instance's progress, and advance one period.
            let entry = descriptor.entry();
            let original = descriptor.original_stack();
            let fresh = self.platform.stack_reinit(original, entry);
            let descriptor = self.table.get_mut(id);
            descriptor.set_context(fresh);
            descriptor.advance_period();
            if descriptor.arrival() <= now {
                self.ready.insert(&mut self.table, id);
            } else {
                self.not_ready.insert(&mut self.table, id);
            }
        } else {
            let descriptor = self.table.remove(id);
            self.platform
                .stack_free(descriptor.original_stack(), descriptor.stack_size());
            log::debug!("task {id} retired, stack released");
        }
    }

    /// Preemption: store the saved context and reinsert the task,
    /// unretired, behind its peers.
    fn requeue_current(&mut self, context: Context) {
        let Some(id) = self.current.take() else {
            // A scheduling tick can fire before the first task is launched;
            // the interrupted context belongs to startup code, not a task.
            return;
        };
        self.table.get_mut(id).set_context(context);
        if self.table.get(id).is_real_time() {
            self.ready.insert(&mut self.table, id);
        } else {
            self.runnable.push(&mut self.table, id);
        }
    }

    /// Pick the next task: ready > runnable > not-ready via busy-wait.
    fn select(&mut self) -> Option<Context> {
        let next = if let Some(id) = self.ready.pop(&mut self.table) {
            Some(id)
        } else if let Some(id) = self.runnable.pop(&mut self.table) {
            Some(id)
        } else {
            self.wait_for_arrival()
        };

        match next {
            Some(id) => {
                self.table.get_mut(id).set_location(Location::Current);
                self.current = Some(id);
                log::trace!("switching to task {id}");
                Some(self.table.get(id).context())
            }
            None => {
                log::debug!("no task left to run");
                None
            }
        }
    }

    /// Busy-wait fallback: only not-ready holds work, so nothing becomes
    /// eligible unless the clock advances. The platform hook re-enables
    /// the tick source while we spin; this is the one place interrupts
    /// come back on mid-decision.
    fn wait_for_arrival(&mut self) -> Option<ProcessId> {
        loop {
            let arrival = self.not_ready.head_key(&self.table)?;
            if arrival <= self.clock.now().as_millis() {
                return self.not_ready.pop(&mut self.table);
            }
            self.platform.wait_for_tick(&self.clock);
        }
    }

    /// First-ever context transfer: run one decision and hand the chosen
    /// context to the platform. Never returns.
    pub fn start(&mut self) -> ! {
        match self.reschedule(None) {
            Some(first) => self.platform.begin(first),
            None => panic!("scheduler started with no admitted tasks"),
        }
    }

    /// Counters and queue depths, for display and tests.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            live: self.table.live(),
            runnable_len: self.runnable.len(),
            ready_len: self.ready.len(),
            not_ready_len: self.not_ready.len(),
            deadline_met: self.stats.met(),
            deadline_miss: self.stats.miss(),
        }
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &ProcessTable {
        &self.table
    }
}

/// Point-in-time view of the scheduler, for shell-style display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub live: usize,
    pub runnable_len: usize,
    pub ready_len: usize,
    pub not_ready_len: usize,
    pub deadline_met: u64,
    pub deadline_miss: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::SimPlatform;

    fn noop() {}

    fn ms(millis: u64) -> TimePoint {
        TimePoint::from_millis(millis)
    }

    fn tick_until(sched: &Scheduler<SimPlatform>, millis: u64) {
        while sched.clock().now().as_millis() < millis {
            sched.clock().tick();
        }
    }

    #[test]
    fn best_effort_tasks_run_fifo() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let a = sched.create(noop, 256).unwrap();
        let b = sched.create(noop, 256).unwrap();

        sched.reschedule(None);
        assert_eq!(sched.current(), Some(a));
        // a completes; b is next in admission order.
        sched.reschedule(None);
        assert_eq!(sched.current(), Some(b));
    }

    #[test]
    fn preempted_best_effort_goes_to_the_back() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let a = sched.create(noop, 256).unwrap();
        let b = sched.create(noop, 256).unwrap();

        let ctx_a = sched.reschedule(None).unwrap();
        assert_eq!(sched.current(), Some(a));
        let ctx_b = sched.reschedule(Some(ctx_a)).unwrap();
        assert_eq!(sched.current(), Some(b));
        // Round-robin between the two.
        sched.reschedule(Some(ctx_b));
        assert_eq!(sched.current(), Some(a));
    }

    #[test]
    fn ready_always_beats_runnable() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let be = sched.create(noop, 256).unwrap();
        let rt = sched.create_rt(noop, 256, ms(0), ms(5_000)).unwrap();

        sched.reschedule(None);
        assert_eq!(sched.current(), Some(rt));
        sched.reschedule(None);
        assert_eq!(sched.current(), Some(be));
    }

    #[test]
    fn earlier_deadline_preempts() {
        // A arrives at 0 with deadline 10s; B arrives at 1s with absolute
        // deadline 3s. The tick at t=1s must switch to B.
        let mut sched = Scheduler::new(SimPlatform::new());
        let a = sched.create_rt(noop, 256, ms(0), ms(10_000)).unwrap();
        let b = sched.create_rt(noop, 256, ms(1_000), ms(2_000)).unwrap();

        let ctx_a = sched.reschedule(None).unwrap();
        assert_eq!(sched.current(), Some(a));

        tick_until(&sched, 1_000);
        sched.reschedule(Some(ctx_a));
        assert_eq!(sched.current(), Some(b));

        // B completes on time, A resumes.
        sched.reschedule(None);
        assert_eq!(sched.current(), Some(a));
        assert_eq!(sched.stats().met(), 1);
    }

    #[test]
    fn completion_after_deadline_counts_a_miss() {
        let mut sched = Scheduler::new(SimPlatform::new());
        sched.create_rt(noop, 256, ms(0), ms(100)).unwrap();
        sched.reschedule(None);
        tick_until(&sched, 200);
        sched.reschedule(None);
        assert_eq!(sched.stats().miss(), 1);
        assert_eq!(sched.stats().met(), 0);
    }

    #[test]
    fn completion_at_deadline_counts_as_met() {
        let mut sched = Scheduler::new(SimPlatform::new());
        sched.create_rt(noop, 256, ms(0), ms(100)).unwrap();
        sched.reschedule(None);
        tick_until(&sched, 100);
        sched.reschedule(None);
        assert_eq!(sched.stats().met(), 1);
        assert_eq!(sched.stats().miss(), 0);
    }

    #[test]
    fn aperiodic_completion_releases_the_stack() {
        let mut sched = Scheduler::new(SimPlatform::new());
        sched.create_rt(noop, 512, ms(0), ms(1_000)).unwrap();
        sched.reschedule(None);
        sched.reschedule(None);
        assert_eq!(sched.platform().live_stacks(), 0);
        assert_eq!(sched.platform().freed().len(), 1);
        assert_eq!(sched.platform().freed()[0].1, 512);
        assert_eq!(sched.snapshot().live, 0);
    }

    #[test]
    fn periodic_rearm_reinits_and_requeues_not_ready() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let p = sched
            .create_periodic(noop, 256, ms(1), ms(10_000), ms(10_000))
            .unwrap();
        // A background task keeps the selection from busy-waiting on p.
        let be = sched.create(noop, 256).unwrap();

        sched.clock().tick();
        let _ctx = sched.reschedule(None).unwrap();
        assert_eq!(sched.current(), Some(p));

        // First instance completes at t=5ms, well before arrival+period.
        tick_until(&sched, 5);
        sched.reschedule(None);
        assert_eq!(sched.current(), Some(be));
        assert_eq!(sched.platform().reinits().len(), 1);
        assert_eq!(sched.table().get(p).arrival(), ms(10_001));
        assert_eq!(sched.table().get(p).deadline(), ms(20_001));
        assert_eq!(sched.snapshot().not_ready_len, 1);
        // Its stack block was reused, not released.
        assert_eq!(sched.platform().live_stacks(), 2);
    }

    #[test]
    fn late_periodic_rearm_goes_straight_to_ready() {
        let mut sched = Scheduler::new(SimPlatform::new());
        sched.create_periodic(noop, 256, ms(0), ms(50), ms(50)).unwrap();
        sched.reschedule(None);
        // The instance overruns two full periods.
        tick_until(&sched, 120);
        sched.reschedule(None);
        // New arrival (50ms) already elapsed: straight to ready, and the
        // decision selects it again immediately.
        assert_eq!(sched.snapshot().not_ready_len, 0);
        assert!(sched.current().is_some());
        assert_eq!(sched.stats().miss(), 1);
    }

    #[test]
    fn busy_wait_spins_until_arrival() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let rt = sched.create_rt(noop, 256, ms(30), ms(1_000)).unwrap();
        // Only not-ready is populated: the decision must drive the clock
        // itself and come back with the task.
        let ctx = sched.reschedule(None);
        assert!(ctx.is_some());
        assert_eq!(sched.current(), Some(rt));
        assert_eq!(sched.platform().idle_ticks(), 30);
        assert!(sched.clock().now() >= ms(30));
    }

    #[test]
    fn empty_scheduler_selects_nothing() {
        let mut sched = Scheduler::new(SimPlatform::new());
        assert_eq!(sched.reschedule(None), None);
        assert_eq!(sched.current(), None);
    }

    #[test]
    fn descriptor_exhaustion_is_reported_and_clean() {
        let mut sched = Scheduler::with_config(
            SimPlatform::new(),
            SchedulerConfig { max_processes: 1 },
        );
        sched.create(noop, 128).unwrap();
        let err = sched.create(noop, 128).unwrap_err();
        assert_eq!(err, SchedulerError::DescriptorExhausted { live: 1, max: 1 });
        // No stack was allocated for the rejected task.
        assert_eq!(sched.platform().live_stacks(), 1);
    }

    #[test]
    fn stack_exhaustion_is_reported_and_clean() {
        let mut sched = Scheduler::new(SimPlatform::with_stack_budget(300));
        sched.create(noop, 256).unwrap();
        let err = sched.create(noop, 256).unwrap_err();
        assert_eq!(err, SchedulerError::StackExhausted { requested: 256 });
        assert_eq!(sched.snapshot().live, 1);
    }

    #[test]
    fn tick_before_first_launch_is_harmless() {
        let mut sched = Scheduler::new(SimPlatform::new());
        let a = sched.create(noop, 128).unwrap();
        // Scheduling tick fires while startup code still runs.
        let ctx = sched.reschedule(Some(Context::new(0xdead)));
        assert_eq!(ctx, Some(sched.table().get(a).context()));
    }

    /// Every live descriptor is in exactly one of the four locations.
    fn assert_single_residency(sched: &Scheduler<SimPlatform>) {
        let snap = sched.snapshot();
        let in_current = usize::from(sched.current().is_some());
        assert_eq!(
            snap.live,
            snap.runnable_len + snap.ready_len + snap.not_ready_len + in_current
        );
        for (id, descriptor) in sched.table().iter() {
            if sched.current() == Some(id) {
                assert_eq!(descriptor.location(), Location::Current);
            }
        }
    }

    #[test]
    fn residency_invariant_holds_across_events() {
        let mut sched = Scheduler::new(SimPlatform::new());
        sched.create(noop, 128).unwrap();
        sched.create_rt(noop, 128, ms(0), ms(400)).unwrap();
        sched.create_periodic(noop, 128, ms(10), ms(200), ms(200)).unwrap();
        assert_single_residency(&sched);

        let mut saved = sched.reschedule(None);
        assert_single_residency(&sched);
        for step in 0..20u64 {
            tick_until(&sched, (step + 1) * 37);
            // Alternate preemption and completion events.
            saved = if step % 2 == 0 {
                sched.reschedule(saved)
            } else {
                sched.reschedule(None)
            };
            assert_single_residency(&sched);
        }
    }
}
