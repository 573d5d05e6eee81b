//! Ready Queue
//!
//! Threads able to run, ordered by urgency. Only the head matters to the
//! scheduler; the rest of the ordering is internal to each implementation.

use heapless::Vec;
use rtk_core::{Priority, ThreadId, MAX_THREADS};

/// Set of ready threads with O(1) access to the most urgent one.
pub trait ReadyQueue: Default {
    /// Add a thread. Inserting a thread already present is a no-op.
    fn insert(&mut self, thread: ThreadId, priority: Priority);

    /// Remove a thread if present.
    fn remove(&mut self, thread: ThreadId);

    /// Most urgent ready thread.
    fn highest(&self) -> Option<ThreadId>;

    fn contains(&self, thread: ThreadId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ready list kept sorted by urgency.
///
/// Threads of equal priority are served in the order they became ready.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    ready_threads: Vec<(ThreadId, Priority), MAX_THREADS>,
}

impl PriorityQueue {
    pub const fn new() -> Self {
        Self {
            ready_threads: Vec::new(),
        }
    }

    /// Ready threads, most urgent first.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready_threads.iter().map(|(id, _)| *id)
    }
}

impl ReadyQueue for PriorityQueue {
    fn insert(&mut self, thread: ThreadId, priority: Priority) {
        if self.contains(thread) {
            return;
        }

        // Behind every entry at least as urgent.
        let position = self
            .ready_threads
            .iter()
            .position(|(_, queued)| priority.preempts(*queued))
            .unwrap_or(self.ready_threads.len());

        // The table holds at most MAX_THREADS descriptors, so this cannot
        // overflow.
        let inserted = self.ready_threads.insert(position, (thread, priority));
        debug_assert!(inserted.is_ok(), "ready queue overflow");
    }

    fn remove(&mut self, thread: ThreadId) {
        self.ready_threads.retain(|(id, _)| *id != thread);
    }

    fn highest(&self) -> Option<ThreadId> {
        self.ready_threads.first().map(|(id, _)| *id)
    }

    fn contains(&self, thread: ThreadId) -> bool {
        self.ready_threads.iter().any(|(id, _)| *id == thread)
    }

    fn len(&self) -> usize {
        self.ready_threads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prio(raw: u8) -> Priority {
        Priority::new_unchecked(raw)
    }

    #[test]
    fn most_urgent_first() {
        let mut queue = PriorityQueue::new();

        queue.insert(ThreadId(1), prio(5));
        queue.insert(ThreadId(2), prio(10));
        queue.insert(ThreadId(3), prio(3));

        assert_eq!(queue.highest(), Some(ThreadId(3)));

        queue.remove(ThreadId(3));
        assert_eq!(queue.highest(), Some(ThreadId(1)));
    }

    #[test]
    fn equal_priorities_keep_arrival_order() {
        let mut queue = PriorityQueue::new();

        queue.insert(ThreadId(4), prio(2));
        queue.insert(ThreadId(5), prio(2));
        queue.insert(ThreadId(6), prio(2));

        let order: std::vec::Vec<_> = queue.iter().collect();
        assert_eq!(order, [ThreadId(4), ThreadId(5), ThreadId(6)]);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut queue = PriorityQueue::new();

        queue.insert(ThreadId(1), prio(5));
        queue.insert(ThreadId(1), prio(5));
        assert_eq!(queue.len(), 1);

        queue.remove(ThreadId(9));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn idle_sinks_to_the_back() {
        let mut queue = PriorityQueue::new();

        queue.insert(ThreadId::IDLE, Priority::IDLE);
        queue.insert(ThreadId(7), Priority::LOWEST);
        assert_eq!(queue.highest(), Some(ThreadId(7)));

        queue.remove(ThreadId(7));
        assert_eq!(queue.highest(), Some(ThreadId::IDLE));
        assert!(!queue.is_empty());
    }
}
