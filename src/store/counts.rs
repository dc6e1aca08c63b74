//! Read-side count lookup trait
//!
//! The probability estimator and the confusion classifier only need two
//! lookups. Keeping them behind a trait lets tests and small tools use an
//! in-memory table instead of a store on disk.

use super::StoreResult;
use crate::ngram::NGram;
use rustc_hash::FxHashMap;

/// Source of n-gram counts
pub trait NgramCounts: Send + Sync {
    /// Occurrence count of `ngram`, 0 if unknown.
    fn count(&self, ngram: &NGram) -> StoreResult<u64>;

    /// Total number of tokens the unigram counts were built from.
    fn total_token_count(&self) -> StoreResult<u64>;
}

/// In-memory counts, keyed by the space-joined n-gram
#[derive(Debug, Clone, Default)]
pub struct MemoryCounts {
    counts: FxHashMap<String, u64>,
    total_tokens: u64,
}

impl MemoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(ngram, count)` pairs. The total token count is the sum
    /// of all unigram counts.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut counts = Self::new();
        for (key, count) in pairs {
            counts.add(key, count);
        }
        counts
    }

    /// Add to the count of a space-joined key. Unigrams also add to the total.
    pub fn add(&mut self, key: &str, count: u64) {
        let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
        if !key.contains(' ') {
            self.total_tokens += count;
        }
        *self.counts.entry(key).or_insert(0) += count;
    }

    /// Override the total token count.
    pub fn set_total_token_count(&mut self, total: u64) {
        self.total_tokens = total;
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl NgramCounts for MemoryCounts {
    fn count(&self, ngram: &NGram) -> StoreResult<u64> {
        Ok(self.counts.get(&ngram.key()).copied().unwrap_or(0))
    }

    fn total_token_count(&self) -> StoreResult<u64> {
        Ok(self.total_tokens)
    }
}
