//! Simulated platform
//!
//! A host-side [`Platform`] that mints opaque context tokens instead of
//! building real stack frames. The test suite drives scheduling events by
//! calling the decision function directly, so no context is ever executed.
//! Also usable by downstream integration tests.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{Context, Platform, TaskEntry};
use crate::clock::Clock;

/// In-memory platform for host tests.
///
/// Tracks every live stack block and every release so tests can assert the
/// core's ownership hand-offs (no double free, no leak on completion).
pub struct SimPlatform {
    next_token: usize,
    /// Live blocks: token -> allocated size.
    live: BTreeMap<usize, usize>,
    /// Released blocks, in release order.
    freed: Vec<(Context, usize)>,
    /// Contexts rebuilt by periodic re-arm.
    reinits: Vec<Context>,
    /// Remaining stack budget; `None` means unlimited.
    budget: Option<usize>,
    /// Ticks injected through the idle hook.
    idle_ticks: u64,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            next_token: 1,
            live: BTreeMap::new(),
            freed: Vec::new(),
            reinits: Vec::new(),
            budget: None,
            idle_ticks: 0,
        }
    }

    /// Cap total stack bytes, to exercise admission failure paths.
    pub fn with_stack_budget(budget: usize) -> Self {
        let mut sim = Self::new();
        sim.budget = Some(budget);
        sim
    }

    pub fn live_stacks(&self) -> usize {
        self.live.len()
    }

    pub fn freed(&self) -> &[(Context, usize)] {
        &self.freed
    }

    pub fn reinits(&self) -> &[Context] {
        &self.reinits
    }

    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimPlatform {
    fn stack_init(&mut self, _entry: TaskEntry, stack_size: usize) -> Option<Context> {
        if let Some(budget) = self.budget.as_mut() {
            if *budget < stack_size {
                return None;
            }
            *budget -= stack_size;
        }
        let token = self.next_token;
        self.next_token += 1;
        self.live.insert(token, stack_size);
        Some(Context::new(token))
    }

    fn stack_reinit(&mut self, stack: Context, _entry: TaskEntry) -> Context {
        assert!(
            self.live.contains_key(&stack.raw()),
            "reinit of unknown stack {:?}",
            stack
        );
        self.reinits.push(stack);
        // The rebuilt context is the original block, rewound.
        stack
    }

    fn stack_free(&mut self, stack: Context, stack_size: usize) {
        let size = self
            .live
            .remove(&stack.raw())
            .unwrap_or_else(|| panic!("double free of stack {:?}", stack));
        assert_eq!(size, stack_size, "freed with wrong size");
        if let Some(budget) = self.budget.as_mut() {
            *budget += stack_size;
        }
        self.freed.push((stack, stack_size));
    }

    fn wait_for_tick(&mut self, clock: &Clock) {
        clock.tick();
        self.idle_ticks += 1;
    }

    fn begin(&mut self, _first: Context) -> ! {
        unimplemented!("SimPlatform cannot perform a real context transfer")
    }
}
