//! Precision/recall evaluation of one confusion pair
//!
//! ```text
//! Init -> LoadSentences -> Evaluate(factor)* -> Aggregate -> Done
//!                 |
//!                 +-> Aborted(TooFewExamples)
//! ```

use super::classifier::{uppercase_first, ConfusionClassifier};
use super::report::{ConfusionMatrix, EvalOutcome, PairEvaluation};
use super::{ConfusionPair, EvalError};
use crate::corpus::{word_pattern, CorpusSentence, SentenceLoader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvalState {
    Init,
    LoadSentences,
    Evaluate(u64),
    Aggregate,
    Done,
    Aborted,
}

/// A sentence fed to the classifier with its expected verdict
#[derive(Debug, Clone)]
pub struct EvalInstance {
    pub text: String,
    /// True if the sentence was made wrong by substitution
    pub is_error: bool,
}

/// Replace the first whole-word occurrence of `from` with `to`. An
/// uppercase initial on the replaced word is carried over.
pub fn substitute_first(sentence: &str, from: &str, to: &str, case_sensitive: bool) -> Option<String> {
    let pattern = word_pattern(from, case_sensitive).ok()?;
    let found = pattern.find(sentence)?;
    let replacement = if found.as_str().chars().next().is_some_and(char::is_uppercase) {
        uppercase_first(to)
    } else {
        to.to_string()
    };
    let mut result = String::with_capacity(sentence.len() + to.len());
    result.push_str(&sentence[..found.start()]);
    result.push_str(&replacement);
    result.push_str(&sentence[found.end()..]);
    Some(result)
}

/// Evaluates pairs with one classifier over one set of example inputs
pub struct ConfusionEvaluator<'a, C: ConfusionClassifier + ?Sized> {
    classifier: &'a C,
    loader: &'a SentenceLoader,
    factors: Vec<u64>,
    min_sentences: usize,
    case_sensitive: bool,
    cancel: CancellationToken,
}

impl<'a, C: ConfusionClassifier + ?Sized> ConfusionEvaluator<'a, C> {
    pub fn new(classifier: &'a C, loader: &'a SentenceLoader, factors: Vec<u64>) -> Self {
        Self {
            classifier,
            loader,
            factors,
            min_sentences: 50,
            case_sensitive: false,
            cancel: CancellationToken::new(),
        }
    }

    /// A pair is aborted when either word has this many examples or fewer.
    pub fn with_min_sentences(mut self, min: usize) -> Self {
        self.min_sentences = min;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn factors(&self) -> &[u64] {
        &self.factors
    }

    fn transition(&self, pair: &ConfusionPair, state: &mut EvalState, next: EvalState) {
        trace!("{}: {:?} -> {:?}", pair, state, next);
        *state = next;
    }

    fn check_cancel(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            Err(EvalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// All example sentences for `word`; `Cancelled` if the scan was cut short.
    fn load(&self, word: &str) -> Result<Vec<CorpusSentence>, EvalError> {
        self.check_cancel()?;
        let mut matching = self.loader.load_with_cancel(word, self.cancel.clone())?;
        let sentences: Vec<CorpusSentence> = matching.by_ref().collect();
        if matching.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        info!(
            "Loaded {} sentences with '{}' from {:?}",
            sentences.len(),
            word,
            self.loader.inputs()
        );
        Ok(sentences)
    }

    /// Evaluate every factor for `pair`.
    pub fn evaluate(&self, pair: &ConfusionPair) -> Result<PairEvaluation, EvalError> {
        let mut state = EvalState::Init;
        self.transition(pair, &mut state, EvalState::LoadSentences);

        let sentences_a = self.load(pair.word_a())?;
        let sentences_b = self.load(pair.word_b())?;
        for (word, count) in [(pair.word_a(), sentences_a.len()), (pair.word_b(), sentences_b.len())] {
            if count <= self.min_sentences {
                self.transition(pair, &mut state, EvalState::Aborted);
                return Err(EvalError::TooFewExamples {
                    word: word.to_string(),
                    count,
                    min: self.min_sentences,
                });
            }
        }

        let instances = self.instances(pair, &sentences_a, &sentences_b);
        debug!("{}: {} instances", pair, instances.len());

        let mut evidence = Vec::with_capacity(instances.len());
        for instance in &instances {
            self.check_cancel()?;
            evidence.push(self.classifier.inspect(&instance.text, pair)?);
        }

        let mut outcomes = Vec::with_capacity(self.factors.len());
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        for &factor in &self.factors {
            self.check_cancel()?;
            self.transition(pair, &mut state, EvalState::Evaluate(factor));
            let mut matrix = ConfusionMatrix::default();
            for (instance, evidence) in instances.iter().zip(&evidence) {
                let flagged = self.classifier.flags(evidence, factor);
                if flagged && !instance.is_error {
                    debug!("false positive with factor {}: {}", factor, instance.text);
                }
                matrix.record(flagged, instance.is_error);
            }
            outcomes.push(EvalOutcome {
                pair: pair.clone(),
                factor,
                matrix,
                count_a: sentences_a.len(),
                count_b: sentences_b.len(),
                date: date.clone(),
            });
        }

        self.transition(pair, &mut state, EvalState::Aggregate);
        for outcome in &outcomes {
            debug!(
                "Factor {}: {} fp, {} fn, {} tp, {} tn",
                outcome.factor,
                outcome.matrix.false_positives,
                outcome.matrix.false_negatives,
                outcome.matrix.true_positives,
                outcome.matrix.true_negatives
            );
        }
        self.transition(pair, &mut state, EvalState::Done);

        Ok(PairEvaluation {
            pair: pair.clone(),
            count_a: sentences_a.len(),
            count_b: sentences_b.len(),
            outcomes,
        })
    }

    /// A sentences as-is (correct) and B sentences with B replaced by A
    /// (wrong); bidirectional pairs also get A replaced by B (wrong) and B
    /// as-is (correct).
    fn instances(
        &self,
        pair: &ConfusionPair,
        sentences_a: &[CorpusSentence],
        sentences_b: &[CorpusSentence],
    ) -> Vec<EvalInstance> {
        let (a, b) = (pair.word_a(), pair.word_b());
        let mut instances = Vec::new();
        let mut add = |sentences: &[CorpusSentence], swap: Option<(&str, &str)>| {
            for s in sentences {
                match swap {
                    None => instances.push(EvalInstance {
                        text: s.text.clone(),
                        is_error: false,
                    }),
                    Some((from, to)) => {
                        if let Some(text) = substitute_first(&s.text, from, to, self.case_sensitive) {
                            instances.push(EvalInstance { text, is_error: true });
                        }
                    }
                }
            }
        };

        add(sentences_a, None);
        add(sentences_b, Some((b, a)));
        if pair.bidirectional {
            add(sentences_a, Some((a, b)));
            add(sentences_b, None);
        }
        instances
    }
}
