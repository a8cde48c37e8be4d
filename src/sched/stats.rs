//! Deadline accounting
//!
//! Two monotonically increasing counters, mutated only inside the
//! completion branch of the decision function, readable from anywhere.

use core::sync::atomic::{AtomicU64, Ordering};

/// Deadline-met / deadline-miss counters. Never reset.
pub struct DeadlineStats {
    met: AtomicU64,
    miss: AtomicU64,
}

impl DeadlineStats {
    pub const fn new() -> Self {
        Self {
            met: AtomicU64::new(0),
            miss: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_met(&self) {
        self.met.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    /// Completions at or before the absolute deadline.
    pub fn met(&self) -> u64 {
        self.met.load(Ordering::Relaxed)
    }

    /// Completions after the absolute deadline.
    pub fn miss(&self) -> u64 {
        self.miss.load(Ordering::Relaxed)
    }
}

impl Default for DeadlineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let stats = DeadlineStats::new();
        stats.record_met();
        stats.record_met();
        stats.record_miss();
        assert_eq!(stats.met(), 2);
        assert_eq!(stats.miss(), 1);
    }
}
