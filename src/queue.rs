//! Queue manager
//!
//! Three singly-linked, head-referenced collections over the process
//! table's intrusive links:
//!
//! - runnable: best-effort FIFO (append at tail, dequeue at head)
//! - not-ready: real-time, ascending arrival time
//! - ready: real-time, ascending absolute deadline
//!
//! Sorted insertion places a new entry after every entry with an
//! equal-or-earlier key, so ties stay FIFO. Insertion is O(depth), head
//! removal O(1); depth is bounded by the number of live tasks. Queue
//! mutation is the scheduler's only critical section, so none of these
//! operations lock on their own.

use crate::process::{Descriptor, Location, ProcessId, ProcessTable};

/// Best-effort run queue, admission order.
pub struct Fifo {
    head: Option<ProcessId>,
    tail: Option<ProcessId>,
    len: usize,
}

impl Fifo {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append at the tail.
    pub fn push(&mut self, table: &mut ProcessTable, id: ProcessId) {
        debug_assert!(table.get(id).next().is_none());
        table.get_mut(id).set_location(Location::Runnable);
        match self.tail {
            Some(tail) => table.get_mut(tail).set_next(Some(id)),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Dequeue the head.
    pub fn pop(&mut self, table: &mut ProcessTable) -> Option<ProcessId> {
        let id = self.head?;
        self.head = table.get(id).next();
        if self.head.is_none() {
            self.tail = None;
        }
        table.get_mut(id).set_next(None);
        self.len -= 1;
        Some(id)
    }

    pub fn iter<'a>(&self, table: &'a ProcessTable) -> LinkIter<'a> {
        LinkIter {
            table,
            cursor: self.head,
        }
    }
}

/// Sort key of an ordered queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Not-ready ordering.
    Arrival,
    /// Ready ordering (earliest deadline first).
    Deadline,
}

impl SortKey {
    fn of(self, descriptor: &Descriptor) -> u64 {
        match self {
            SortKey::Arrival => descriptor.arrival().as_millis(),
            SortKey::Deadline => descriptor.deadline().as_millis(),
        }
    }

    fn location(self) -> Location {
        match self {
            SortKey::Arrival => Location::NotReady,
            SortKey::Deadline => Location::Ready,
        }
    }
}

/// Real-time queue kept ascending by its sort key.
pub struct Ordered {
    head: Option<ProcessId>,
    len: usize,
    key: SortKey,
}

impl Ordered {
    pub const fn new(key: SortKey) -> Self {
        Self {
            head: None,
            len: 0,
            key,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Key of the head entry, if any.
    pub fn head_key(&self, table: &ProcessTable) -> Option<u64> {
        self.head.map(|id| self.key.of(table.get(id)))
    }

    /// Insert in ascending key order, after all equal-or-earlier entries.
    pub fn insert(&mut self, table: &mut ProcessTable, id: ProcessId) {
        debug_assert!(table.get(id).next().is_none());
        debug_assert!(table.get(id).is_real_time());
        let key = self.key.of(table.get(id));
        table.get_mut(id).set_location(self.key.location());

        let mut prev: Option<ProcessId> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if self.key.of(table.get(c)) > key {
                break;
            }
            prev = Some(c);
            cursor = table.get(c).next();
        }
        table.get_mut(id).set_next(cursor);
        match prev {
            Some(prev) => table.get_mut(prev).set_next(Some(id)),
            None => self.head = Some(id),
        }
        self.len += 1;
    }

    /// Dequeue the head (smallest key, oldest among ties).
    pub fn pop(&mut self, table: &mut ProcessTable) -> Option<ProcessId> {
        let id = self.head?;
        self.head = table.get(id).next();
        table.get_mut(id).set_next(None);
        self.len -= 1;
        Some(id)
    }

    pub fn iter<'a>(&self, table: &'a ProcessTable) -> LinkIter<'a> {
        LinkIter {
            table,
            cursor: self.head,
        }
    }
}

/// Walks a queue's intrusive links.
pub struct LinkIter<'a> {
    table: &'a ProcessTable,
    cursor: Option<ProcessId>,
}

impl<'a> Iterator for LinkIter<'a> {
    type Item = ProcessId;

    fn next(&mut self) -> Option<ProcessId> {
        let id = self.cursor?;
        self.cursor = self.table.get(id).next();
        Some(id)
    }
}
