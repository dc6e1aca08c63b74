//! Sentence -> 1/2/3-gram windows
//!
//! Markers are added around each sentence, then every contiguous window of
//! length 1..=3 is emitted. Over-long tokens are usually URLs or garbage;
//! any window containing one is dropped whole (never truncated).

use super::{NGram, MAX_ORDER, SENTENCE_END, SENTENCE_START};

/// Tokens longer than this (in chars) are excluded from all n-grams.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 20;

#[derive(Debug, Clone)]
pub struct NgramExtractor {
    max_token_length: usize,
}

impl NgramExtractor {
    pub fn new(max_token_length: usize) -> Self {
        Self { max_token_length }
    }

    pub fn max_token_length(&self) -> usize {
        self.max_token_length
    }

    /// Call `visit(order, key)` for every window of the sentence, in position
    /// order and, per position, shortest window first.
    pub fn visit<S, F>(&self, sentence_tokens: &[S], mut visit: F)
    where
        S: AsRef<str>,
        F: FnMut(usize, String),
    {
        let tokens: Vec<&str> = std::iter::once(SENTENCE_START)
            .chain(sentence_tokens.iter().map(|t| t.as_ref()))
            .chain(std::iter::once(SENTENCE_END))
            .filter(|t| !t.trim().is_empty())
            .collect();
        let too_long: Vec<bool> = tokens
            .iter()
            .map(|t| t.chars().count() > self.max_token_length)
            .collect();

        for end in 0..tokens.len() {
            for order in 1..=MAX_ORDER {
                if order > end + 1 {
                    break;
                }
                let start = end + 1 - order;
                if too_long[start..=end].iter().any(|&long| long) {
                    continue;
                }
                visit(order, tokens[start..=end].join(" "));
            }
        }
    }

    /// All windows of the sentence as n-grams.
    pub fn extract<S: AsRef<str>>(&self, sentence_tokens: &[S]) -> Vec<NGram> {
        let mut out = Vec::new();
        self.visit(sentence_tokens, |_, key| {
            if let Some(ngram) = NGram::parse(&key) {
                out.push(ngram);
            }
        });
        out
    }
}

impl Default for NgramExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKEN_LENGTH)
    }
}
