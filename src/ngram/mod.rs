//! N-gram keys and extraction
//!
//! An n-gram is 1 to 3 word tokens used as a single lookup key in the
//! frequency store. Keys are serialized space-joined, the same text the
//! store indexes on.

mod extractor;

pub use extractor::{NgramExtractor, DEFAULT_MAX_TOKEN_LENGTH};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Synthetic token prepended to every sentence.
pub const SENTENCE_START: &str = "_START_";
/// Synthetic token appended to every sentence.
pub const SENTENCE_END: &str = "_END_";

/// Highest order the store keeps.
pub const MAX_ORDER: usize = 3;

/// An ordered sequence of 1..=3 tokens.
///
/// The order is fixed at creation. Tokens never contain spaces, so the
/// space-joined key can be split back into the same tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NGram {
    tokens: Vec<String>,
}

impl NGram {
    /// Build an n-gram from tokens. Returns `None` for 0 or more than 3 tokens,
    /// or if a token is empty or contains whitespace.
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Option<Self> {
        if tokens.is_empty() || tokens.len() > MAX_ORDER {
            return None;
        }
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        if tokens.iter().any(|t| t.is_empty() || t.chars().any(char::is_whitespace)) {
            return None;
        }
        Some(Self { tokens })
    }

    /// Parse a space-joined key (`"the nice building"`).
    pub fn parse(key: &str) -> Option<Self> {
        let tokens: Vec<&str> = key.split_whitespace().collect();
        Self::new(&tokens)
    }

    pub fn order(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The store key.
    pub fn key(&self) -> String {
        self.tokens.join(" ")
    }

    /// All tokens but the last, i.e. the conditioning context.
    /// `None` for unigrams.
    pub fn prefix(&self) -> Option<NGram> {
        if self.tokens.len() < 2 {
            return None;
        }
        Some(Self { tokens: self.tokens[..self.tokens.len() - 1].to_vec() })
    }

    /// The last `order - 1` tokens, used for backoff. `None` for unigrams.
    pub fn backoff(&self) -> Option<NGram> {
        if self.tokens.len() < 2 {
            return None;
        }
        Some(Self { tokens: self.tokens[1..].to_vec() })
    }
}

impl fmt::Display for NGram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_limits() {
        assert!(NGram::new::<&str>(&[]).is_none());
        assert!(NGram::new(&["a", "b", "c", "d"]).is_none());
        assert_eq!(NGram::new(&["a", "b", "c"]).unwrap().order(), 3);
    }

    #[test]
    fn test_rejects_whitespace_tokens() {
        assert!(NGram::new(&["a b"]).is_none());
        assert!(NGram::new(&[""]).is_none());
    }

    #[test]
    fn test_prefix_and_backoff() {
        let n = NGram::parse("the nice building").unwrap();
        assert_eq!(n.prefix().unwrap().key(), "the nice");
        assert_eq!(n.backoff().unwrap().key(), "nice building");
        assert!(NGram::parse("the").unwrap().prefix().is_none());
    }
}
