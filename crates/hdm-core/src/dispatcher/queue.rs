//! Priority-ordered work queue feeding the worker pool.
//!
//! Higher tiers pop first. Within a tier entries come out oldest first, but
//! callers must not rely on that.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Dispatch tiers, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    /// Planning probe for a newly submitted file.
    NewCheck,
    /// First run of a freshly planned part.
    NewPartDownload,
    /// Part revived by a resume.
    PausedTask,
    /// Part handed back by its worker after eviction.
    EvictedTask,
}

struct Entry<T> {
    priority: TaskPriority,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) struct TaskQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> TaskQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn push(&mut self, task: T, priority: TaskPriority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority,
            seq,
            task,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.task)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.heap.len();
        self.heap.clear();
        dropped
    }
}
