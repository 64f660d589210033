//! Bounded priority queue for VP-tree search, with f32 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::index::Neighbor;

/// A scored candidate as seen during traversal.
///
/// `key` decides rank (smaller is better, see [`Metric::rank_key`]);
/// `threshold` bounds the pruning-space distance of anything that ranks
/// at least as well, see [`Metric::pruning_threshold`].
///
/// [`Metric::rank_key`]: crate::distance::Metric::rank_key
/// [`Metric::pruning_threshold`]: crate::distance::Metric::pruning_threshold
#[derive(Debug, Clone, Copy)]
pub struct Ranked {
    pub position: usize,
    pub score: f32,
    pub key: f32,
    pub threshold: f64,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

// Worse candidates compare greater, so a BinaryHeap keeps the worst on top.
impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Holds at most `capacity` candidates, evicting the worst.
#[derive(Debug)]
pub struct NeighborQueue {
    heap: BinaryHeap<Ranked>,
    capacity: usize,
}

impl NeighborQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Insert if there is room, or replace the current worst if `candidate`
    /// ranks ahead of it.
    pub fn offer(&mut self, candidate: Ranked) {
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
            return;
        }
        if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Pruning threshold of the worst kept candidate.
    pub fn worst_threshold(&self) -> Option<f64> {
        self.heap.peek().map(|r| r.threshold)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into neighbors ordered best first.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| Neighbor {
                position: r.position,
                score: r.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(position: usize, key: f32) -> Ranked {
        Ranked {
            position,
            score: key,
            key,
            threshold: f64::from(key),
        }
    }

    #[test]
    fn test_bounded_offer_keeps_best() {
        let mut queue = NeighborQueue::new(2);
        queue.offer(ranked(0, 5.0));
        queue.offer(ranked(1, 1.0));
        assert!(queue.is_full());
        assert_eq!(queue.worst_threshold(), Some(5.0));

        queue.offer(ranked(2, 3.0));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.worst_threshold(), Some(3.0));

        let sorted = queue.into_sorted_vec();
        assert_eq!(sorted[0].position, 1);
        assert_eq!(sorted[1].position, 2);
    }

    #[test]
    fn test_worse_candidate_is_rejected() {
        let mut queue = NeighborQueue::new(1);
        queue.offer(ranked(0, 1.0));
        queue.offer(ranked(1, 2.0));
        assert_eq!(queue.into_sorted_vec()[0].position, 0);
    }

    #[test]
    fn test_ties_prefer_lower_position() {
        let mut queue = NeighborQueue::new(1);
        queue.offer(ranked(4, 1.0));
        queue.offer(ranked(2, 1.0));
        queue.offer(ranked(7, 1.0));
        assert_eq!(queue.into_sorted_vec()[0].position, 2);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut queue = NeighborQueue::new(0);
        queue.offer(ranked(0, 1.0));
        assert!(queue.is_empty());
        assert!(queue.is_full());
    }
}
