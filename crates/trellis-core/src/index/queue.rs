//! Priority queues over `(distance, id)` pairs
//!
//! `search_layer` walks the graph with two heaps: a min-heap of candidates
//! still to expand and a bounded max-heap of the best results found so far.
//! Both order entries by distance with the point id as tiebreaker, so the
//! order is total and identical runs produce identical traversals.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::types::point::PointId;

/// A scored point in a search frontier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Point ID
    pub id: PointId,
    /// Distance to the reference point
    pub distance: f32,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(id: PointId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Distance first, id as tiebreaker for a stable total order
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Min-heap of candidates to expand, closest first
#[derive(Debug, Default)]
pub struct MinCandidates(BinaryHeap<Reverse<Candidate>>);

impl MinCandidates {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a candidate
    pub fn push(&mut self, candidate: Candidate) {
        self.0.push(Reverse(candidate));
    }

    /// Pop the closest candidate
    pub fn pop(&mut self) -> Option<Candidate> {
        self.0.pop().map(|Reverse(c)| c)
    }

    /// Peek at the closest candidate
    pub fn peek(&self) -> Option<&Candidate> {
        self.0.peek().map(|Reverse(c)| c)
    }

    /// Number of queued candidates
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bounded max-heap of results, farthest on top for cheap eviction
///
/// Pushing past the cap evicts the farthest entry, so the heap always holds
/// the `cap` closest candidates seen so far.
#[derive(Debug)]
pub struct MaxResults {
    heap: BinaryHeap<Candidate>,
    cap: usize,
}

impl MaxResults {
    /// Create an empty result set bounded to `cap` entries
    pub fn new(cap: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(cap + 1),
            cap,
        }
    }

    /// Push a candidate, evicting the farthest when past the cap
    pub fn push(&mut self, candidate: Candidate) {
        self.heap.push(candidate);
        while self.heap.len() > self.cap {
            self.heap.pop();
        }
    }

    /// Peek at the farthest retained candidate
    pub fn farthest(&self) -> Option<&Candidate> {
        self.heap.peek()
    }

    /// Whether the set holds `cap` entries
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.cap
    }

    /// Number of retained candidates
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume the set, returning candidates sorted closest-first
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_candidates_pops_closest_first() {
        let mut queue = MinCandidates::new();
        assert!(queue.is_empty());

        queue.push(Candidate::new(1, 0.5));
        queue.push(Candidate::new(2, 0.1));
        queue.push(Candidate::new(3, 0.9));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().unwrap().id, 2);
        assert_eq!(queue.pop().unwrap().id, 2);
        assert_eq!(queue.pop().unwrap().id, 1);
        assert_eq!(queue.pop().unwrap().id, 3);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_tie_broken_by_id() {
        let mut queue = MinCandidates::new();
        queue.push(Candidate::new(7, 0.5));
        queue.push(Candidate::new(3, 0.5));

        assert_eq!(queue.pop().unwrap().id, 3);
        assert_eq!(queue.pop().unwrap().id, 7);
    }

    #[test]
    fn test_max_results_evicts_farthest() {
        let mut results = MaxResults::new(2);
        results.push(Candidate::new(1, 0.5));
        results.push(Candidate::new(2, 0.1));
        results.push(Candidate::new(3, 0.9));

        assert_eq!(results.len(), 2);
        assert_eq!(results.farthest().unwrap().id, 1);

        let sorted = results.into_sorted_vec();
        assert_eq!(sorted[0].id, 2);
        assert_eq!(sorted[1].id, 1);
    }

    #[test]
    fn test_max_results_below_cap_keeps_everything() {
        let mut results = MaxResults::new(10);
        results.push(Candidate::new(1, 0.5));
        results.push(Candidate::new(2, 0.1));

        assert!(!results.is_full());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_into_sorted_vec_ascending() {
        let mut results = MaxResults::new(4);
        for (id, d) in [(4u64, 0.4), (1, 0.1), (3, 0.3), (2, 0.2)] {
            results.push(Candidate::new(id, d));
        }

        let ids: Vec<_> = results.into_sorted_vec().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_cap_of_one_is_a_greedy_slot() {
        let mut results = MaxResults::new(1);
        results.push(Candidate::new(1, 0.5));
        results.push(Candidate::new(2, 0.7));
        results.push(Candidate::new(3, 0.2));

        let sorted = results.into_sorted_vec();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].id, 3);
    }
}
