//! Bounded pending-work queue with priority-major, arrival-minor ordering.
//!
//! The queue only stores items; admission policy beyond the length cap
//! (timeouts, pause, dispatch) lives in the dispatcher.

use std::collections::VecDeque;

/// Identifier assigned to every submission.
pub type TaskId = u64;

/// Rejection at submission time. The only error callers see synchronously.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("queue is full ({size}/{limit})")]
    QueueFull { size: usize, limit: usize },
}

#[derive(Debug)]
struct Entry<T> {
    id: TaskId,
    priority: i32,
    item: T,
}

/// Ordered collection of pending items with a fixed length limit.
///
/// Higher priority sorts first; items with equal priority keep arrival order.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    entries: VecDeque<Entry<T>>,
    limit: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Insert behind every entry with priority >= `priority`.
    /// Rejects without modifying the queue when `len() >= limit()`.
    pub fn push(&mut self, id: TaskId, priority: i32, item: T) -> Result<(), AdmissionError> {
        if self.entries.len() >= self.limit {
            return Err(AdmissionError::QueueFull {
                size: self.entries.len(),
                limit: self.limit,
            });
        }
        let pos = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(pos, Entry { id, priority, item });
        Ok(())
    }

    /// Remove the highest-priority, earliest-arrived item.
    pub fn pop_front(&mut self) -> Option<(TaskId, T)> {
        self.entries.pop_front().map(|e| (e.id, e.item))
    }

    /// Remove a specific item (e.g. on wait-timeout). `None` if it already left.
    pub fn remove(&mut self, id: TaskId) -> Option<T> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(pos).map(|e| e.item)
    }

    /// Remove every pending item, in queue order.
    pub fn drain(&mut self) -> Vec<(TaskId, T)> {
        self.entries.drain(..).map(|e| (e.id, e.item)).collect()
    }

    /// Pending ids in dispatch order.
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_priority_then_arrival() {
        let mut q = BoundedQueue::new(10);
        q.push(1, 0, "a").unwrap();
        q.push(2, 0, "b").unwrap();
        q.push(3, 5, "c").unwrap();
        q.push(4, 0, "d").unwrap();
        q.push(5, 5, "e").unwrap();
        q.push(6, -1, "f").unwrap();
        assert_eq!(q.ids(), vec![3, 5, 1, 2, 4, 6]);
        assert_eq!(q.pop_front(), Some((3, "c")));
        assert_eq!(q.pop_front(), Some((5, "e")));
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn rejects_when_full_and_leaves_queue_unchanged() {
        let mut q = BoundedQueue::new(2);
        q.push(1, 0, ()).unwrap();
        q.push(2, 0, ()).unwrap();
        let err = q.push(3, 9, ()).unwrap_err();
        assert_eq!(err, AdmissionError::QueueFull { size: 2, limit: 2 });
        assert_eq!(q.ids(), vec![1, 2]);
    }

    #[test]
    fn remove_by_id() {
        let mut q = BoundedQueue::new(4);
        q.push(1, 0, 'x').unwrap();
        q.push(2, 0, 'y').unwrap();
        assert_eq!(q.remove(1), Some('x'));
        assert_eq!(q.remove(1), None);
        assert_eq!(q.ids(), vec![2]);
    }

    #[test]
    fn drain_empties_in_order() {
        let mut q = BoundedQueue::new(4);
        q.push(1, 0, 'x').unwrap();
        q.push(2, 3, 'y').unwrap();
        let drained = q.drain();
        assert_eq!(drained, vec![(2, 'y'), (1, 'x')]);
        assert!(q.is_empty());
    }
}
