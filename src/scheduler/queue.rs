//! Ranked ready queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordering key of a queued entry. Smaller ranks are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct Rank {
    /// Coarse class (e.g. inbound before outbound).
    pub class: u8,
    /// Priority within the class.
    pub priority: u32,
}

#[derive(Debug)]
struct Entry<T> {
    rank: Rank,
    order: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.order == other.order
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap; invert so the smallest (rank, order) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.rank, other.order).cmp(&(self.rank, self.order))
    }
}

/// Min-heap on `(rank, insertion order)`: equal ranks are served FIFO.
#[derive(Debug)]
pub(crate) struct ReadyQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_order: u64,
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_order: 0,
        }
    }
}

impl<T> ReadyQueue<T> {
    pub(crate) fn push(&mut self, item: T, rank: Rank) {
        let order = self.next_order;
        self.next_order += 1;
        self.heap.push(Entry { rank, order, item });
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(class: u8, priority: u32) -> Rank {
        Rank { class, priority }
    }

    #[test]
    fn test_equal_ranks_are_fifo() {
        let mut queue = ReadyQueue::default();
        for i in 0..5 {
            queue.push(i, Rank::default());
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_lower_priority_value_first() {
        let mut queue = ReadyQueue::default();
        queue.push("a", rank(0, 99));
        queue.push("b", rank(0, 98));
        queue.push("c", rank(0, 99));
        queue.push("d", rank(0, 0));

        assert_eq!(queue.len(), 4);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(order, vec!["d", "b", "a", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_class_dominates_priority() {
        let mut queue = ReadyQueue::default();
        queue.push("out-urgent", rank(1, 0));
        queue.push("in-lazy", rank(0, 200));

        assert_eq!(queue.pop(), Some("in-lazy"));
        assert_eq!(queue.pop(), Some("out-urgent"));
    }
}
