//! Platform boundary
//!
//! Everything hardware-specific sits behind the [`Platform`] trait: the
//! layout of an initial execution context, the first context transfer, and
//! the way the core waits for the clock while idle. The scheduling core
//! only moves opaque [`Context`] handles around, which keeps it portable
//! and unit-testable by simulating ticks and scheduling events directly.

pub mod sim;

use crate::clock::Clock;

/// Entry point of a task. The task runs until this function returns; the
/// platform's initial context plants the completion trampoline as its
/// return address.
pub type TaskEntry = fn();

/// Opaque handle to a saved execution context.
///
/// On hardware this is the stack pointer of a prepared stack frame; in
/// simulation it is an arbitrary token. The core never dereferences it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Context(usize);

impl Context {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

/// Hardware services the scheduling core requires.
///
/// Implementations own stack memory and the context-switch machinery.
/// The core guarantees `stack_free` and `stack_reinit` are only ever
/// called with a context previously returned by `stack_init` on the
/// same platform.
pub trait Platform {
    /// Build the initial execution context for a task: allocate `stack_size`
    /// bytes and lay out a frame that starts at `entry` and returns into the
    /// completion trampoline. `None` on stack exhaustion.
    fn stack_init(&mut self, entry: TaskEntry, stack_size: usize) -> Option<Context>;

    /// Rebuild the initial frame in place on an existing stack block,
    /// discarding any prior progress. Used by periodic re-arm; must not
    /// allocate. Returns the fresh context (the original block, rewound).
    fn stack_reinit(&mut self, stack: Context, entry: TaskEntry) -> Context;

    /// Release a stack previously produced by `stack_init`.
    fn stack_free(&mut self, stack: Context, stack_size: usize);

    /// Idle hook for the busy-wait fallback: re-enable whatever advances
    /// the clock, let (at least) one tick through, then return with the
    /// queue critical section restored. Simulations tick the clock here.
    fn wait_for_tick(&mut self, clock: &Clock);

    /// Perform the very first context transfer. Never returns.
    fn begin(&mut self, first: Context) -> !;
}
