//! Channel pair frequency analysis.
//!
//! Counts how often each `(ChannelIDL, ChannelIDR)` pair occurs and keeps the
//! pairs seen at least `threshold` times. Counting is a commutative merge, so
//! chunks of one file can be counted independently and combined in any order.

use rayon::prelude::*;
use rustpet_core::CoincidenceBatch;
use std::collections::{BTreeSet, HashMap};

/// A `(left, right)` channel ID pair.
pub type ChannelPair = (u64, u64);

/// Occurrence counts per channel pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPairCounts {
    counts: HashMap<ChannelPair, u64>,
}

impl ChannelPairCounts {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the pairs of one batch.
    #[must_use]
    pub fn from_batch(batch: &CoincidenceBatch) -> Self {
        let mut counts = Self::new();
        counts.add_batch(batch);
        counts
    }

    /// Adds the pairs of `batch`.
    pub fn add_batch(&mut self, batch: &CoincidenceBatch) {
        for (&l, &r) in batch.channel_id_l.iter().zip(&batch.channel_id_r) {
            self.add((l, r));
        }
    }

    /// Counts one occurrence of `pair`.
    pub fn add(&mut self, pair: ChannelPair) {
        *self.counts.entry(pair).or_insert(0) += 1;
    }

    /// Adds every count of `other`.
    pub fn merge(&mut self, other: &Self) {
        for (&pair, &n) in &other.counts {
            *self.counts.entry(pair).or_insert(0) += n;
        }
    }

    /// Combines two counters, reusing the larger map.
    #[must_use]
    pub fn merged(self, other: Self) -> Self {
        let (mut big, small) = if self.counts.len() >= other.counts.len() {
            (self, other)
        } else {
            (other, self)
        };
        big.merge(&small);
        big
    }

    /// Occurrences of `pair`.
    #[must_use]
    pub fn count(&self, pair: ChannelPair) -> u64 {
        self.counts.get(&pair).copied().unwrap_or(0)
    }

    /// Number of distinct pairs.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Highest count of any pair (0 when empty).
    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    /// Pairs with at least `threshold` occurrences, sorted.
    #[must_use]
    pub fn frequent(&self, threshold: u64) -> BTreeSet<ChannelPair> {
        self.counts
            .iter()
            .filter(|&(_, &n)| n >= threshold)
            .map(|(&pair, _)| pair)
            .collect()
    }

    /// Iterates over `(pair, count)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelPair, u64)> + '_ {
        self.counts.iter().map(|(&pair, &n)| (pair, n))
    }
}

/// Pairs of `batch` occurring at least `threshold` times.
#[must_use]
pub fn frequent_channel_pairs(batch: &CoincidenceBatch, threshold: u64) -> BTreeSet<ChannelPair> {
    ChannelPairCounts::from_batch(batch).frequent(threshold)
}

/// Counts pairs over several batches in parallel.
#[must_use]
pub fn count_channel_pairs_in(batches: &[CoincidenceBatch]) -> ChannelPairCounts {
    batches
        .par_iter()
        .map(ChannelPairCounts::from_batch)
        .reduce(ChannelPairCounts::new, ChannelPairCounts::merged)
}

/// [`frequent_channel_pairs`] over the union of several batches.
#[must_use]
pub fn frequent_channel_pairs_in(
    batches: &[CoincidenceBatch],
    threshold: u64,
) -> BTreeSet<ChannelPair> {
    count_channel_pairs_in(batches).frequent(threshold)
}
