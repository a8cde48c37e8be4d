//! Process table - descriptor arena
//!
//! Slot arena with an explicit free list. Slots hand out stable
//! [`ProcessId`] indices, so queue linkage never holds references into the
//! arena and descriptors never move while live. Non-periodic completion
//! returns the slot to the free list.

use alloc::vec::Vec;
use core::fmt;

use crate::process::descriptor::Descriptor;

/// Stable index of a live descriptor in the process table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pid{}", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum Slot {
    Vacant { next_free: Option<u32> },
    Occupied(Descriptor),
}

/// Arena of process descriptors, bounded by the configured maximum.
pub struct ProcessTable {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    live: usize,
    capacity: usize,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            live: 0,
            capacity,
        }
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.live >= self.capacity
    }

    /// Admit a descriptor. `None` when the table is at capacity.
    pub fn insert(&mut self, descriptor: Descriptor) -> Option<ProcessId> {
        if self.is_full() {
            return None;
        }
        self.live += 1;
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free_head = match slot {
                    Slot::Vacant { next_free } => *next_free,
                    Slot::Occupied(_) => unreachable!("free list points at live slot"),
                };
                *slot = Slot::Occupied(descriptor);
                Some(ProcessId(index))
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied(descriptor));
                Some(ProcessId(index))
            }
        }
    }

    /// Retire a descriptor, returning the slot to the free list.
    pub fn remove(&mut self, id: ProcessId) -> Descriptor {
        let slot = core::mem::replace(
            &mut self.slots[id.index()],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        match slot {
            Slot::Occupied(descriptor) => {
                self.free_head = Some(id.index() as u32);
                self.live -= 1;
                descriptor
            }
            // Queue linkage naming a vacant slot is unrecoverable corruption.
            Slot::Vacant { .. } => panic!("removed vacant slot {:?}", id),
        }
    }

    pub fn get(&self, id: ProcessId) -> &Descriptor {
        match &self.slots[id.index()] {
            Slot::Occupied(descriptor) => descriptor,
            Slot::Vacant { .. } => panic!("dangling process id {:?}", id),
        }
    }

    pub fn get_mut(&mut self, id: ProcessId) -> &mut Descriptor {
        match &mut self.slots[id.index()] {
            Slot::Occupied(descriptor) => descriptor,
            Slot::Vacant { .. } => panic!("dangling process id {:?}", id),
        }
    }

    /// Iterate over live descriptors, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &Descriptor)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(descriptor) => Some((ProcessId(i as u32), descriptor)),
            Slot::Vacant { .. } => None,
        })
    }
}
