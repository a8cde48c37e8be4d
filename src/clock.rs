//! Millisecond clock
//!
//! Process-wide monotonically increasing time, advanced by a 1 kHz tick.
//! The tick source is an interrupt on real hardware and the test harness
//! (or `Platform::wait_for_tick`) in simulation.

use core::cmp::Ordering;
use core::fmt;
use core::ops::Add;

use spin::Mutex;

/// A point in scheduler time: whole seconds plus milliseconds.
///
/// Invariant: `msec` is always in `[0, 999]`. Every constructor and every
/// arithmetic operation renormalizes, so two equal instants always have
/// identical fields and derived equality is sound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimePoint {
    sec: u32,
    msec: u16,
}

impl TimePoint {
    pub const ZERO: TimePoint = TimePoint { sec: 0, msec: 0 };

    /// Build a time point, carrying excess milliseconds into seconds.
    pub const fn new(sec: u32, msec: u32) -> Self {
        Self {
            sec: sec + msec / 1000,
            msec: (msec % 1000) as u16,
        }
    }

    /// Build from a flat millisecond count.
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            sec: (millis / 1000) as u32,
            msec: (millis % 1000) as u16,
        }
    }

    /// Flat millisecond count; the comparison key for every queue order.
    pub const fn as_millis(self) -> u64 {
        self.sec as u64 * 1000 + self.msec as u64
    }

    pub const fn sec(self) -> u32 {
        self.sec
    }

    pub const fn msec(self) -> u16 {
        self.msec
    }

    /// Advance by one millisecond, carrying into seconds at 1000.
    pub fn advance_millis(&mut self) {
        self.msec += 1;
        if self.msec >= 1000 {
            self.sec += 1;
            self.msec = 0;
        }
    }

    pub const fn is_zero(self) -> bool {
        self.sec == 0 && self.msec == 0
    }
}

impl Add for TimePoint {
    type Output = TimePoint;

    fn add(self, rhs: TimePoint) -> TimePoint {
        TimePoint::new(self.sec + rhs.sec, self.msec as u32 + rhs.msec as u32)
    }
}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_millis().cmp(&other.as_millis())
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.sec, self.msec)
    }
}

/// The scheduler clock.
///
/// `tick()` runs in the highest-priority interrupt; the scheduler reads
/// `now()` while comparing queue keys. Both go through the same short
/// critical section so a half-updated carry is never observed.
pub struct Clock {
    now: Mutex<TimePoint>,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            now: Mutex::new(TimePoint::ZERO),
        }
    }

    /// Advance time by one millisecond. Called at 1 kHz.
    pub fn tick(&self) {
        self.now.lock().advance_millis();
    }

    /// Current time, read under the tick's critical section.
    pub fn now(&self) -> TimePoint {
        *self.now.lock()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(TimePoint: Copy, Send, Sync);
    assert_impl_all!(Clock: Send, Sync);

    #[test]
    fn new_carries_excess_millis() {
        let t = TimePoint::new(1, 2500);
        assert_eq!(t.sec(), 3);
        assert_eq!(t.msec(), 500);
    }

    #[test]
    fn add_renormalizes() {
        let t = TimePoint::new(0, 600) + TimePoint::new(0, 600);
        assert_eq!(t, TimePoint::new(1, 200));
    }

    #[test]
    fn tick_carries_at_second_boundary() {
        let clock = Clock::new();
        for _ in 0..1001 {
            clock.tick();
        }
        let now = clock.now();
        assert_eq!(now.sec(), 1);
        assert_eq!(now.msec(), 1);
    }

    #[test]
    fn ordering_follows_flat_millis() {
        assert!(TimePoint::new(0, 999) < TimePoint::new(1, 0));
        assert!(TimePoint::new(2, 0) > TimePoint::new(1, 999));
        assert_eq!(TimePoint::new(1, 1000), TimePoint::new(2, 0));
    }

    proptest! {
        #[test]
        fn millis_always_normalized(sec in 0u32..1_000_000, msec in 0u32..100_000) {
            let t = TimePoint::new(sec, msec);
            prop_assert!(t.msec() < 1000);
            prop_assert_eq!(t.as_millis(), sec as u64 * 1000 + msec as u64);
        }

        #[test]
        fn add_is_normalized_and_commutative(
            a in 0u64..10_000_000, b in 0u64..10_000_000
        ) {
            let x = TimePoint::from_millis(a) + TimePoint::from_millis(b);
            let y = TimePoint::from_millis(b) + TimePoint::from_millis(a);
            prop_assert!(x.msec() < 1000);
            prop_assert_eq!(x, y);
            prop_assert_eq!(x.as_millis(), a + b);
        }

        #[test]
        fn advance_preserves_invariant(start in 0u64..5_000_000, steps in 0u32..3000) {
            let mut t = TimePoint::from_millis(start);
            for _ in 0..steps {
                t.advance_millis();
            }
            prop_assert!(t.msec() < 1000);
            prop_assert_eq!(t.as_millis(), start + steps as u64);
        }
    }
}
