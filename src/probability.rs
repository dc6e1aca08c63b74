//! Backoff pseudo-probability over stored n-gram counts
//!
//! P(w_n | w_1..w_{n-1}) is estimated as count(w_1..w_n) / count(w_1..w_{n-1}).
//! When the context was never seen, the estimate backs off to the n-gram
//! made of the last n-1 tokens, down to count(w) / total tokens.
//! This is a conditional frequency, not a smoothed language model: unseen
//! events get 0.

use crate::ngram::NGram;
use crate::store::{NgramCounts, StoreResult};
use serde::Serialize;
use tracing::trace;

/// A frequency ratio with the counts it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probability {
    /// Count of the n-gram actually used (after backoff)
    pub numerator: u64,
    /// Count of its context, or the total token count for unigrams
    pub denominator: u64,
    /// `numerator / denominator`, always in `[0, 1]`
    pub ratio: f64,
    /// Order of the n-gram the ratio was computed for
    pub order: usize,
}

impl Probability {
    fn new(numerator: u64, denominator: u64, order: usize) -> Self {
        let ratio = if denominator == 0 {
            0.0
        } else {
            // Counts from separate flushes can be slightly inconsistent
            (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
        };
        Self {
            numerator,
            denominator,
            ratio,
            order,
        }
    }

    /// True if the n-gram itself was seen at least once.
    pub fn is_covered(&self) -> bool {
        self.numerator > 0
    }
}

/// Estimates pseudo-probabilities from any count source
pub struct ProbabilityEstimator<'a, C: NgramCounts + ?Sized> {
    counts: &'a C,
}

impl<'a, C: NgramCounts + ?Sized> ProbabilityEstimator<'a, C> {
    pub fn new(counts: &'a C) -> Self {
        Self { counts }
    }

    /// Pseudo-probability of the last token of `ngram` given the others.
    pub fn probability(&self, ngram: &NGram) -> StoreResult<Probability> {
        let mut current = ngram.clone();
        loop {
            let Some(context) = current.prefix() else {
                let count = self.counts.count(&current)?;
                let total = self.counts.total_token_count()?;
                trace!("P({}) = {}/{} (unigram)", current, count, total);
                return Ok(Probability::new(count, total, 1));
            };

            let context_count = self.counts.count(&context)?;
            if context_count > 0 {
                let count = self.counts.count(&current)?;
                trace!("P({}) = {}/{}", current, count, context_count);
                return Ok(Probability::new(count, context_count, current.order()));
            }

            // Context never seen: back off to the last order-1 tokens
            match current.backoff() {
                Some(shorter) => current = shorter,
                None => return Ok(Probability::new(0, 0, current.order())),
            }
        }
    }

    /// Convenience wrapper for token slices. Empty or over-long input is 0.
    pub fn probability_of<S: AsRef<str>>(&self, tokens: &[S]) -> StoreResult<Probability> {
        match NGram::new(tokens) {
            Some(ngram) => self.probability(&ngram),
            None => Ok(Probability::new(0, 0, tokens.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCounts;

    fn sample_counts() -> MemoryCounts {
        MemoryCounts::from_pairs([
            ("the", 55),
            ("nice", 10),
            ("building", 1),
            ("the nice", 3),
            ("nice building", 2),
            ("the nice building", 1),
        ])
    }

    fn p(counts: &MemoryCounts, key: &str) -> Probability {
        ProbabilityEstimator::new(counts)
            .probability(&NGram::parse(key).unwrap())
            .unwrap()
    }

    #[test]
    fn test_trigram_uses_bigram_prefix() {
        let counts = sample_counts();
        let prob = p(&counts, "the nice building");
        assert_eq!((prob.numerator, prob.denominator), (1, 3));
        assert!((prob.ratio - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(prob.order, 3);
    }

    #[test]
    fn test_unigram_uses_total() {
        let counts = sample_counts();
        let prob = p(&counts, "nice");
        assert_eq!((prob.numerator, prob.denominator), (10, 66));
    }

    #[test]
    fn test_backoff_when_context_unseen() {
        let counts = sample_counts();
        // "a nice" never seen -> back off to "nice building" = 2/10
        let prob = p(&counts, "a nice building");
        assert_eq!(prob.order, 2);
        assert_eq!((prob.numerator, prob.denominator), (2, 10));
    }

    #[test]
    fn test_backoff_to_unigram() {
        let counts = sample_counts();
        // neither "x y" nor "y" seen -> P(building)
        let prob = p(&counts, "x y building");
        assert_eq!(prob.order, 1);
        assert_eq!((prob.numerator, prob.denominator), (1, 66));
    }

    #[test]
    fn test_empty_store_is_zero_not_nan() {
        let counts = MemoryCounts::new();
        for key in ["a", "a b", "a b c"] {
            let prob = p(&counts, key);
            assert_eq!(prob.ratio, 0.0);
            assert!(prob.ratio.is_finite());
        }
    }

    #[test]
    fn test_ratio_always_in_unit_interval() {
        // inconsistent data: n-gram seen more often than its context
        let mut counts = MemoryCounts::from_pairs([("a", 1), ("a b", 5)]);
        counts.set_total_token_count(0);
        let prob = p(&counts, "a b");
        assert!((0.0..=1.0).contains(&prob.ratio));
        let prob = p(&counts, "a");
        assert_eq!(prob.ratio, 0.0);
    }
}
