//! Bounded FIFO queue shared between tasks.
//!
//! [`BoundedQueue`] is the hand-off point between the upper layer, the ARQ
//! workers and the lower layer. `push` waits while the queue is full and
//! `pop` waits while it is empty; `try_pop` and `is_empty` never wait.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Fixed-capacity async FIFO.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// Append `item`, waiting for room if the queue is full.
    pub async fn push(&self, item: T) {
        loop {
            let notified = self.not_full.notified();
            {
                let mut items = self.items.lock();
                if items.len() < self.capacity {
                    items.push_back(item);
                    drop(items);
                    self.not_empty.notify_one();
                    return;
                }
            }
            notified.await;
        }
    }

    /// Remove the oldest item, waiting until one is available.
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.not_empty.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.items.lock();
        let item = items.pop_front()?;
        let more = !items.is_empty();
        drop(items);

        self.not_full.notify_one();
        if more {
            // Pass the wakeup on in case several consumers are parked.
            self.not_empty.notify_one();
        }
        Some(item)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = BoundedQueue::new(4);
        queue.push(1).await;
        queue.push(2).await;
        queue.push(3).await;

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await, 1);
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.pop().await, 3);
        assert!(queue.is_empty());
        assert_eq!(queue.try_pop(), None);
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(BoundedQueue::new(2));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!consumer.is_finished());

        queue.push(42u32).await;
        assert_eq!(consumer.await.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_waits_while_full() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1u32).await;

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(2).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().await, 1);
        producer.await.unwrap();
        assert_eq!(queue.pop().await, 2);
    }
}
