//! Queue of reclamation notices produced for phantom slots.
//!
//! The collector is the only producer. Consumers may hold their own `Arc`
//! to the queue and drain it without touching the tracker lock.

use crate::object::ObjectId;
use crossbeam::queue::SegQueue;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub object: ObjectId,
    pub timestamp: Instant,
}

#[derive(Debug, Default)]
pub struct NotificationQueue {
    entries: SegQueue<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, object: ObjectId, timestamp: Instant) {
        self.entries.push(Notification { object, timestamp });
    }

    /// Single non-blocking pop.
    pub fn poll(&self) -> Option<Notification> {
        self.entries.pop()
    }

    /// Remove and return everything currently queued, oldest first. Entries
    /// pushed while the drain runs may or may not be included.
    pub fn drain_all(&self) -> Vec<Notification> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop() {
            drained.push(entry);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_is_fifo() {
        let queue = NotificationQueue::new();
        let now = Instant::now();

        queue.enqueue(ObjectId::from_raw(3), now);
        queue.enqueue(ObjectId::from_raw(1), now);

        let drained: Vec<ObjectId> = queue.drain_all().iter().map(|n| n.object).collect();
        assert_eq!(drained, vec![ObjectId::from_raw(3), ObjectId::from_raw(1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty() {
        let queue = NotificationQueue::new();
        assert!(queue.drain_all().is_empty());
        assert!(queue.poll().is_none());
    }

    #[test]
    fn test_consumer_on_other_thread() {
        let queue = Arc::new(NotificationQueue::new());
        let now = Instant::now();
        for i in 1..=100 {
            queue.enqueue(ObjectId::from_raw(i), now);
        }

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain_all().len())
        };

        assert_eq!(consumer.join().unwrap(), 100);
        assert_eq!(queue.len(), 0);
    }
}
