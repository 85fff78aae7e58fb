use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored record position. Orders by distance, then by insertion position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub pos: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.pos.cmp(&other.pos))
    }
}

/// Keeps the `k` smallest candidates seen so far; the heap top is the current worst.
pub(crate) struct TopK {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    pub fn new(k: usize) -> Self { Self { k, heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)) } }

    pub fn push(&mut self, cand: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(cand);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if cand < *worst { *worst = cand; }
        }
    }

    /// Ascending by distance, ties by position.
    pub fn into_sorted(self) -> Vec<Candidate> { self.heap.into_sorted_vec() }
}
