//! Confusion pair evaluation
//!
//! A pair of easily confused words ("there"/"their") is evaluated by
//! taking example sentences for both words, producing wrong sentences by
//! substituting one word for the other and counting how often a classifier
//! flags the wrong ones (and only those) at each threshold factor.

mod automatic;
mod candidates;
mod classifier;
mod evaluator;
mod report;

pub use automatic::{AutoReport, AutomaticEvaluator, PairReport, PairStatus};
pub use candidates::{
    load_candidates, parse_candidate_line, parse_candidates, CandidateParseError, ConfusionPair,
    ConfusionString, KnownSets,
};
pub use classifier::{ConfusionClassifier, NgramConfusionClassifier, Suspicion};
pub use evaluator::{substitute_first, ConfusionEvaluator, EvalInstance};
pub use report::{f_measure, ConfusionMatrix, EvalOutcome, FactorReport, PairEvaluation};

use crate::corpus::CorpusError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Evaluation errors
#[derive(Error, Debug)]
pub enum EvalError {
    /// Not enough examples for one of the words; only this pair is skipped
    #[error("too few examples for '{word}': {count} (need more than {min})")]
    TooFewExamples { word: String, count: usize, min: usize },

    #[error("file with example sentences not found: {0}")]
    ExampleFileNotFound(PathBuf),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(CorpusError),

    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl EvalError {
    /// Errors that must stop a whole batch run, not just the current pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EvalError::Cancelled | EvalError::Store(_) | EvalError::WorkerPool(_)
        )
    }
}

impl From<CorpusError> for EvalError {
    fn from(e: CorpusError) -> Self {
        match e {
            CorpusError::ExampleFileNotFound(path) => EvalError::ExampleFileNotFound(path),
            other => EvalError::Io(other),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{ConfusionClassifier, ConfusionPair, EvalError};
    use std::path::Path;

    /// Flags exactly the sentences that substitution made wrong.
    pub(crate) struct OracleClassifier;

    impl ConfusionClassifier for OracleClassifier {
        type Evidence = bool;

        fn inspect(&self, sentence: &str, _pair: &ConfusionPair) -> Result<bool, EvalError> {
            let lower = sentence.to_lowercase();
            Ok(lower.contains("over their") || lower.contains("there car"))
        }

        fn flags(&self, evidence: &bool, _factor: u64) -> bool {
            *evidence
        }
    }

    /// `there.txt` and `their.txt` with distinct example sentences.
    pub(crate) fn write_examples(dir: &Path, n_there: usize, n_their: usize) {
        let there: String = (0..n_there).map(|i| format!("Go over there {}.\n", i)).collect();
        let their: String = (0..n_their)
            .map(|i| format!("That is their car {}.\n", i))
            .collect();
        std::fs::write(dir.join("there.txt"), there).unwrap();
        std::fs::write(dir.join("their.txt"), their).unwrap();
    }
}
