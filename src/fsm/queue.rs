//! Multi-priority pending-event queues
//!
//! `nqueues` independent FIFO lists, numbered 0 (lowest priority) to
//! `nqueues - 1` (highest). Events are appended at the tail of their
//! priority's list and served from the head of the highest non-empty one.
//! The machine wraps the whole structure in one mutex; nothing in here
//! locks.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::{FsmError, FsmResult};

/// An event waiting in a queue, with its owned payload copy.
///
/// The payload is dropped when the event is dequeued and processed.
#[derive(Debug)]
pub(crate) struct PendingEvent {
    pub event_key: u32,
    pub priority: usize,
    pub payload: Vec<u8>,
}

/// The FIFO lists backing the event queue, one per priority.
pub(crate) struct PriorityQueues {
    queues: Vec<VecDeque<PendingEvent>>,
}

impl PriorityQueues {
    pub fn new(nqueues: usize) -> Self {
        let mut queues = Vec::with_capacity(nqueues);
        for _ in 0..nqueues {
            queues.push(VecDeque::new());
        }
        Self { queues }
    }

    /// Append an event at the tail of its priority's list.
    ///
    /// The event's priority must have been validated against `nqueues` by
    /// the caller.
    pub fn push(&mut self, event: PendingEvent) -> FsmResult {
        let queue = &mut self.queues[event.priority];
        queue.try_reserve(1).map_err(|_| FsmError::OutOfMemory)?;
        queue.push_back(event);
        Ok(())
    }

    /// Take the head of the highest-priority non-empty list.
    pub fn pop_highest(&mut self) -> Option<PendingEvent> {
        for queue in self.queues.iter_mut().rev() {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
        }
        None
    }

    /// Total number of pending events across all priorities.
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(key: u32, priority: usize) -> PendingEvent {
        PendingEvent {
            event_key: key,
            priority,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_highest_priority_served_first() {
        let mut queues = PriorityQueues::new(3);
        queues.push(event(10, 0)).unwrap();
        queues.push(event(11, 2)).unwrap();
        queues.push(event(12, 1)).unwrap();

        assert_eq!(queues.pop_highest().unwrap().event_key, 11);
        assert_eq!(queues.pop_highest().unwrap().event_key, 12);
        assert_eq!(queues.pop_highest().unwrap().event_key, 10);
        assert!(queues.pop_highest().is_none());
    }

    #[test]
    fn test_fifo_within_one_priority() {
        let mut queues = PriorityQueues::new(2);
        for key in [1, 2, 3] {
            queues.push(event(key, 1)).unwrap();
        }
        assert_eq!(queues.pop_highest().unwrap().event_key, 1);
        assert_eq!(queues.pop_highest().unwrap().event_key, 2);
        assert_eq!(queues.pop_highest().unwrap().event_key, 3);
    }

    #[test]
    fn test_total_len() {
        let mut queues = PriorityQueues::new(2);
        assert_eq!(queues.total_len(), 0);
        queues.push(event(1, 0)).unwrap();
        queues.push(event(2, 1)).unwrap();
        assert_eq!(queues.total_len(), 2);
        queues.pop_highest();
        assert_eq!(queues.total_len(), 1);
    }
}
