// src/topk.rs
//
// Bounded nearest-K selection for the contact term. Candidates stream in
// from the lattice loop in no particular order; the selector keeps the K
// smallest ranks seen so far in a sorted fixed array, K being the number
// of contact-coupled neighbours.

use std::collections::TryReserveError;

/// Sentinel rank marking a slot that was never filled.
const EMPTY: f64 = -1.0;

/// Fixed-capacity collection of the K smallest-rank entries, each carrying
/// a payload vector. Ranks stay sorted ascending over the filled prefix;
/// unused slots hold a negative sentinel.
#[derive(Debug, Clone)]
pub struct TopK {
    ranks: Vec<f64>,
    values: Vec<[f64; 3]>,
}

impl TopK {
    /// Allocate `capacity` empty slots, failing instead of aborting when
    /// the storage cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut ranks = Vec::new();
        ranks.try_reserve_exact(capacity)?;
        ranks.resize(capacity, EMPTY);
        let mut values = Vec::new();
        values.try_reserve_exact(capacity)?;
        values.resize(capacity, [0.0; 3]);
        Ok(Self { ranks, values })
    }

    pub fn capacity(&self) -> usize {
        self.ranks.len()
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.ranks.iter().take_while(|&&r| r >= 0.0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.first().is_none_or(|&r| r < 0.0)
    }

    /// Ranks, sorted ascending; sentinel-valued past `len()`.
    pub fn ranks(&self) -> &[f64] {
        &self.ranks
    }

    /// Payloads parallel to `ranks()`.
    pub fn values(&self) -> &[[f64; 3]] {
        &self.values
    }

    /// Keep `(rank, value)` if it is among the K smallest ranks seen.
    ///
    /// The entry lands at its sorted position and the tail shifts one slot
    /// right, dropping the current maximum off the end. A rank at least as
    /// large as a full selector's maximum is discarded; equal ranks keep
    /// arrival order.
    pub fn insert(&mut self, rank: f64, value: [f64; 3]) {
        debug_assert!(rank >= 0.0, "rank {rank} collides with the empty sentinel");
        for i in 0..self.ranks.len() {
            if self.ranks[i] < 0.0 || rank < self.ranks[i] {
                for j in (i + 1..self.ranks.len()).rev() {
                    self.ranks[j] = self.ranks[j - 1];
                    self.values[j] = self.values[j - 1];
                }
                self.ranks[i] = rank;
                self.values[i] = value;
                return;
            }
        }
    }

    /// Fold another selector's entries into this one. Streaming the union
    /// through `insert` keeps exactly the K smallest of both, so per-chunk
    /// selectors can be reduced pairwise.
    pub fn merge(&mut self, other: &TopK) {
        for i in 0..other.len() {
            self.insert(other.ranks[i], other.values[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(tag: f64) -> [f64; 3] {
        [tag, 10.0 * tag, -tag]
    }

    #[test]
    fn keeps_smallest_ranks_sorted() {
        let mut top = TopK::new(3).unwrap();
        for &r in &[5.0, 1.0, 4.0, 2.0, 8.0] {
            top.insert(r, payload(r));
        }
        assert_eq!(top.len(), 3);
        assert_eq!(top.ranks(), &[1.0, 2.0, 4.0]);
        assert_eq!(top.values()[0], payload(1.0));
        assert_eq!(top.values()[2], payload(4.0));
    }

    #[test]
    fn partial_fill_leaves_sentinels() {
        let mut top = TopK::new(4).unwrap();
        top.insert(3.0, payload(3.0));
        top.insert(1.0, payload(1.0));
        assert_eq!(top.len(), 2);
        assert_eq!(top.ranks()[..2], [1.0, 3.0]);
        assert!(top.ranks()[2] < 0.0);
        assert!(top.ranks()[3] < 0.0);
    }

    #[test]
    fn rank_equal_to_maximum_is_discarded() {
        let mut top = TopK::new(2).unwrap();
        top.insert(1.0, payload(1.0));
        top.insert(2.0, payload(2.0));
        top.insert(2.0, payload(99.0)); // not strictly smaller, dropped
        assert_eq!(top.ranks(), &[1.0, 2.0]);
        assert_eq!(top.values()[1], payload(2.0));
    }

    #[test]
    fn zero_capacity_accepts_nothing() {
        let mut top = TopK::new(0).unwrap();
        top.insert(1.0, payload(1.0));
        assert_eq!(top.len(), 0);
        assert!(top.is_empty());
    }

    #[test]
    fn merge_equals_streaming_the_union() {
        let ranks = [7.0, 3.0, 9.0, 1.0, 4.0, 6.0, 2.0, 8.0];
        let mut whole = TopK::new(4).unwrap();
        for &r in &ranks {
            whole.insert(r, payload(r));
        }

        let (left, right) = ranks.split_at(3);
        let mut a = TopK::new(4).unwrap();
        for &r in left {
            a.insert(r, payload(r));
        }
        let mut b = TopK::new(4).unwrap();
        for &r in right {
            b.insert(r, payload(r));
        }
        a.merge(&b);

        assert_eq!(a.ranks(), whole.ranks());
        assert_eq!(a.values(), whole.values());
    }
}
