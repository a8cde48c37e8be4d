//! Scheduler error handling
//!
//! Admission is the only fallible operation the core exposes: a task
//! either gets both a descriptor slot and a stack, or nothing changes.
//! Deadline misses are recorded outcomes, not errors; queue or clock
//! corruption is a fatal programming error with no recovery path.

use core::fmt;

/// Why an admission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// Process table is at its configured capacity.
    DescriptorExhausted { live: usize, max: usize },

    /// The platform could not build an initial stack of the requested size.
    StackExhausted { requested: usize },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DescriptorExhausted { live, max } => {
                write!(f, "process table full ({live}/{max} descriptors)")
            }
            Self::StackExhausted { requested } => {
                write!(f, "stack allocation of {requested} bytes failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_exhausted_resource() {
        let e = SchedulerError::DescriptorExhausted { live: 4, max: 4 };
        assert_eq!(alloc::format!("{e}"), "process table full (4/4 descriptors)");
        let e = SchedulerError::StackExhausted { requested: 512 };
        assert!(alloc::format!("{e}").contains("512"));
    }
}
