//! Process descriptor model
//!
//! Per-task records and the arena that owns them.

pub mod descriptor;
pub mod table;

pub use descriptor::{Descriptor, DescriptorFlags, Location};
pub use table::{ProcessId, ProcessTable};
