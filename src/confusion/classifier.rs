//! Decision rules that flag a confusion in a sentence

use super::{ConfusionPair, EvalError};
use crate::ngram::{NGram, SENTENCE_END, SENTENCE_START};
use crate::probability::ProbabilityEstimator;
use crate::store::NgramCounts;
use crate::tokenize::WordTokenizer;
use tracing::trace;

/// Decides whether a sentence uses the wrong word of a pair.
///
/// `inspect` gathers whatever the rule needs from the sentence once;
/// `flags` then answers per threshold factor without touching the sentence
/// again.
pub trait ConfusionClassifier: Send + Sync {
    type Evidence;

    fn inspect(&self, sentence: &str, pair: &ConfusionPair) -> Result<Self::Evidence, EvalError>;

    fn flags(&self, evidence: &Self::Evidence, factor: u64) -> bool;

    fn flags_error(&self, sentence: &str, pair: &ConfusionPair, factor: u64) -> Result<bool, EvalError> {
        Ok(self.flags(&self.inspect(sentence, pair)?, factor))
    }
}

/// One occurrence of a pair word with both context probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct Suspicion {
    pub position: usize,
    pub written: String,
    pub alternative: String,
    pub p_written: f64,
    pub p_alternative: f64,
}

impl Suspicion {
    fn flagged(&self, factor: u64) -> bool {
        self.p_alternative > self.p_written * factor as f64
    }
}

/// Trigram-context rule: the alternative must be `factor` times more
/// likely than the written word in its left, middle and right trigrams.
pub struct NgramConfusionClassifier<'a, C: NgramCounts + ?Sized, W> {
    estimator: ProbabilityEstimator<'a, C>,
    tokenizer: W,
}

fn is_real_word(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

fn is_common_word(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn map_first_char(s: &str, f: impl Fn(char) -> String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => f(first) + chars.as_str(),
        None => String::new(),
    }
}

pub(crate) fn uppercase_first(s: &str) -> String {
    map_first_char(s, |c| c.to_uppercase().collect())
}

fn lowercase_first(s: &str) -> String {
    map_first_char(s, |c| c.to_lowercase().collect())
}

impl<'a, C: NgramCounts + ?Sized, W: WordTokenizer> NgramConfusionClassifier<'a, C, W> {
    pub fn new(counts: &'a C, tokenizer: W) -> Self {
        Self {
            estimator: ProbabilityEstimator::new(counts),
            tokenizer,
        }
    }

    /// Product of the left, middle and right trigram probabilities of
    /// `term` placed at `pos`; 0 if none of the three was ever seen.
    fn context_probability(&self, tokens: &[String], pos: usize, term: &str) -> Result<f64, EvalError> {
        let mut product = 1.0;
        let mut covered = false;
        for (left, right) in [(0, 2), (1, 1), (2, 0)] {
            let context = context_window(tokens, pos, term, left, right);
            let prob = match NGram::new(&context) {
                Some(ngram) => self.estimator.probability(&ngram)?,
                None => return Ok(0.0),
            };
            trace!("{:?}: {}/{}", context, prob.numerator, prob.denominator);
            covered |= prob.is_covered();
            product *= prob.ratio;
        }
        Ok(if covered { product } else { 0.0 })
    }
}

/// Up to `left` tokens before `pos`, `term`, then up to `right` tokens
/// after `pos`. Running past the end adds a single sentence-end marker.
fn context_window(tokens: &[String], pos: usize, term: &str, left: usize, right: usize) -> Vec<String> {
    let start = pos.saturating_sub(left);
    let mut context: Vec<String> = tokens[start..pos].to_vec();
    context.push(term.to_string());
    for i in 1..=right {
        match tokens.get(pos + i) {
            Some(token) => context.push(token.clone()),
            None => {
                context.push(SENTENCE_END.to_string());
                break;
            }
        }
    }
    context
}

impl<'a, C, W> ConfusionClassifier for NgramConfusionClassifier<'a, C, W>
where
    C: NgramCounts + ?Sized,
    W: WordTokenizer,
{
    type Evidence = Vec<Suspicion>;

    fn inspect(&self, sentence: &str, pair: &ConfusionPair) -> Result<Vec<Suspicion>, EvalError> {
        let mut tokens = vec![SENTENCE_START.to_string()];
        tokens.extend(self.tokenizer.tokens(sentence));
        // _START_ plus one token: no real context
        if tokens.len() <= 2 {
            return Ok(Vec::new());
        }

        let mut suspicions = Vec::new();
        let mut real_word_before = false;
        for pos in 1..tokens.len() {
            let token = tokens[pos].as_str();
            let found = match pair.alternative_for(token) {
                Some(alt) => Some(alt.to_string()),
                // lowercase lookup only at the sentence start
                None if !real_word_before && starts_uppercase(token) && is_real_word(token) => {
                    pair.alternative_for(&lowercase_first(token)).map(uppercase_first)
                }
                None => None,
            };
            if is_real_word(token) {
                real_word_before = true;
            }
            let Some(alternative) = found else {
                continue;
            };
            if pos == 1 && tokens.get(2).is_some_and(|next| !is_common_word(next)) {
                continue;
            }

            let p_written = self.context_probability(&tokens, pos, token)?;
            let p_alternative = self.context_probability(&tokens, pos, &alternative)?;
            trace!(
                "P({})={:e} P({})={:e} in '{}'",
                token,
                p_written,
                alternative,
                p_alternative,
                sentence
            );
            suspicions.push(Suspicion {
                position: pos,
                written: token.to_string(),
                alternative,
                p_written,
                p_alternative,
            });
        }
        Ok(suspicions)
    }

    fn flags(&self, evidence: &Vec<Suspicion>, factor: u64) -> bool {
        evidence.iter().any(|s| s.flagged(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngram::NgramExtractor;
    use crate::store::MemoryCounts;
    use crate::tokenize::SimpleWordTokenizer;

    /// Counts built from a few sentences the same way ingestion does.
    fn counts_from(sentences: &[&str]) -> MemoryCounts {
        let extractor = NgramExtractor::default();
        let mut counts = MemoryCounts::new();
        for sentence in sentences {
            let tokens = SimpleWordTokenizer.tokens(sentence);
            // unigrams also add to the total
            extractor.visit(&tokens, |_, key| counts.add(&key, 1));
        }
        counts
    }

    #[test]
    fn test_context_window() {
        let tokens: Vec<String> = ["_START_", "over", "there", "now"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(context_window(&tokens, 2, "X", 0, 2), vec!["X", "now", "_END_"]);
        assert_eq!(context_window(&tokens, 2, "X", 1, 1), vec!["over", "X", "now"]);
        assert_eq!(context_window(&tokens, 2, "X", 2, 0), vec!["_START_", "over", "X"]);
        assert_eq!(context_window(&tokens, 3, "X", 0, 2), vec!["X", "_END_"]);
        assert_eq!(context_window(&tokens, 1, "X", 2, 0), vec!["_START_", "X"]);
    }

    #[test]
    fn test_flags_wrong_word_in_context() {
        let counts = counts_from(&[
            "I live over there .",
            "I live over there .",
            "They sold their car .",
            "They sold their car .",
        ]);
        let classifier = NgramConfusionClassifier::new(&counts, SimpleWordTokenizer);
        let pair = ConfusionPair::new("there", "their", true);

        assert!(classifier.flags_error("I live over their .", &pair, 10).unwrap());
        assert!(classifier.flags_error("They sold there car .", &pair, 10).unwrap());
        assert!(!classifier.flags_error("I live over there .", &pair, 10).unwrap());
        assert!(!classifier.flags_error("They sold their car .", &pair, 10).unwrap());
    }

    #[test]
    fn test_one_way_only_flags_first_word() {
        let counts = counts_from(&["They sold their car .", "They sold their car ."]);
        let classifier = NgramConfusionClassifier::new(&counts, SimpleWordTokenizer);
        let one_way = ConfusionPair::new("their", "there", false);
        // "there" is not the word this pair may flag
        assert!(!classifier.flags_error("They sold there car .", &one_way, 10).unwrap());
    }

    #[test]
    fn test_single_token_never_flagged() {
        let counts = counts_from(&["their"]);
        let classifier = NgramConfusionClassifier::new(&counts, SimpleWordTokenizer);
        let pair = ConfusionPair::new("there", "their", true);
        assert!(classifier.inspect("there", &pair).unwrap().is_empty());
    }

    #[test]
    fn test_sentence_start_uses_lowercase_lookup() {
        let counts = counts_from(&["Their car is red .", "Their car is red ."]);
        let classifier = NgramConfusionClassifier::new(&counts, SimpleWordTokenizer);
        let pair = ConfusionPair::new("there", "their", true);
        let evidence = classifier.inspect("There car is red .", &pair).unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].alternative, "Their");
        assert!(classifier.flags(&evidence, 100));
    }

    #[test]
    fn test_unseen_context_is_zero() {
        let counts = MemoryCounts::new();
        let classifier = NgramConfusionClassifier::new(&counts, SimpleWordTokenizer);
        let pair = ConfusionPair::new("there", "their", true);
        let evidence = classifier.inspect("over there now", &pair).unwrap();
        assert_eq!(evidence[0].p_written, 0.0);
        assert_eq!(evidence[0].p_alternative, 0.0);
        assert!(!classifier.flags(&evidence, 10));
    }
}
