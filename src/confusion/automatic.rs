//! Batch evaluation of many candidate pairs

use super::classifier::ConfusionClassifier;
use super::evaluator::ConfusionEvaluator;
use super::report::FactorReport;
use super::{ConfusionPair, EvalError, KnownSets};
use dashmap::DashSet;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// What happened to one candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// At least one factor reached both thresholds
    Good,
    NoGoodResult,
    /// Per-pair failure such as too few examples
    Skipped,
    /// Already part of a known confusion set
    Ignored,
    /// Same pair evaluated earlier in this run
    FinishedBefore,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub pair: String,
    pub bidirectional: bool,
    pub status: PairStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_a: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_b: Option<usize>,
    /// Every factor that was evaluated
    pub factors: Vec<FactorReport>,
    /// Factors reaching both thresholds
    pub best_factors: Vec<u64>,
}

impl PairReport {
    fn without_results(pair: &ConfusionPair, status: PairStatus, reason: Option<String>) -> Self {
        Self {
            pair: pair.to_string(),
            bidirectional: pair.bidirectional,
            status,
            reason,
            count_a: None,
            count_b: None,
            factors: Vec::new(),
            best_factors: Vec::new(),
        }
    }

    /// `=> summary` for every good factor, otherwise a one-line status.
    pub fn text_lines(&self) -> Vec<String> {
        match self.status {
            PairStatus::Good => self
                .factors
                .iter()
                .filter(|f| self.best_factors.contains(&f.factor))
                .map(|f| format!("=> {}", f.summary))
                .collect(),
            PairStatus::NoGoodResult => vec![format!("No good result found for {}", self.pair)],
            PairStatus::Skipped => vec![format!(
                "Skipping {}: {}",
                self.pair,
                self.reason.as_deref().unwrap_or("failed")
            )],
            PairStatus::Ignored => vec![format!(
                "Ignoring: {}, in active confusion sets already",
                self.pair
            )],
            PairStatus::FinishedBefore => vec![format!("Ignoring: {}, finished before", self.pair)],
        }
    }
}

/// Whole-run report
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoReport {
    pub pairs: Vec<PairReport>,
    pub good: usize,
    pub skipped: usize,
    pub ignored: usize,
}

impl AutoReport {
    pub fn text_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.pairs.iter().flat_map(|p| p.text_lines()).collect();
        lines.push(format!(
            "Done. Ignored items because they are already known: {}",
            self.ignored
        ));
        lines
    }
}

/// Runs [`ConfusionEvaluator`] over candidate pairs, skipping known and
/// repeated pairs.
pub struct AutomaticEvaluator<'a, C: ConfusionClassifier + ?Sized> {
    evaluator: ConfusionEvaluator<'a, C>,
    known: KnownSets,
    finished: DashSet<(String, String)>,
    min_precision: f64,
    min_recall: f64,
    workers: usize,
}

impl<'a, C: ConfusionClassifier + ?Sized> AutomaticEvaluator<'a, C> {
    pub fn new(evaluator: ConfusionEvaluator<'a, C>) -> Self {
        Self {
            evaluator,
            known: KnownSets::default(),
            finished: DashSet::new(),
            min_precision: 0.95,
            min_recall: 0.10,
            workers: 1,
        }
    }

    pub fn with_known_sets(mut self, known: KnownSets) -> Self {
        self.known = known;
        self
    }

    pub fn with_thresholds(mut self, min_precision: f64, min_recall: f64) -> Self {
        self.min_precision = min_precision;
        self.min_recall = min_recall;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Mark a pair as evaluated. False if it (or, for bidirectional pairs,
    /// its reverse) was claimed before.
    fn claim(&self, pair: &ConfusionPair) -> bool {
        let (a, b) = (pair.word_a().to_string(), pair.word_b().to_string());
        if pair.bidirectional {
            let fresh = self.finished.insert((a.clone(), b.clone()));
            self.finished.insert((b, a)) && fresh
        } else {
            self.finished.insert((a, b))
        }
    }

    fn run_pair(&self, pair: &ConfusionPair) -> Result<PairReport, EvalError> {
        if !self.claim(pair) {
            info!("Ignoring: {}, finished before", pair);
            return Ok(PairReport::without_results(pair, PairStatus::FinishedBefore, None));
        }
        if self.known.contains(pair) {
            info!("Ignoring: {}, in active confusion sets already", pair);
            return Ok(PairReport::without_results(pair, PairStatus::Ignored, None));
        }

        info!("Working on: {}", pair.label());
        let evaluation = match self.evaluator.evaluate(pair) {
            Ok(evaluation) => evaluation,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", pair, e);
                return Ok(PairReport::without_results(
                    pair,
                    PairStatus::Skipped,
                    Some(e.to_string()),
                ));
            }
        };

        let best_factors: Vec<u64> = evaluation
            .best(self.min_precision, self.min_recall)
            .iter()
            .map(|o| o.factor)
            .collect();
        let status = if best_factors.is_empty() {
            info!("No good result found for {}", pair);
            PairStatus::NoGoodResult
        } else {
            PairStatus::Good
        };
        Ok(PairReport {
            pair: pair.to_string(),
            bidirectional: pair.bidirectional,
            status,
            reason: None,
            count_a: Some(evaluation.count_a),
            count_b: Some(evaluation.count_b),
            factors: evaluation.outcomes.iter().map(FactorReport::from).collect(),
            best_factors,
        })
    }

    /// Evaluate all pairs. Per-pair failures are reported in the result;
    /// store failures and cancellation abort the run.
    pub fn run(&self, pairs: &[ConfusionPair]) -> Result<AutoReport, EvalError> {
        let completed = AtomicUsize::new(0);
        let total = pairs.len();
        let step = |pair: &ConfusionPair| {
            let result = self.run_pair(pair);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "Pair {} of {} ({:.2}%)",
                done,
                total,
                done as f64 / total.max(1) as f64 * 100.0
            );
            result
        };

        let reports: Vec<PairReport> = if self.workers == 1 {
            pairs.iter().map(step).collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()?;
            pool.install(|| pairs.par_iter().map(step).collect::<Result<_, _>>())?
        };

        let count = |status: PairStatus| reports.iter().filter(|r| r.status == status).count();
        let report = AutoReport {
            good: count(PairStatus::Good),
            skipped: count(PairStatus::Skipped),
            ignored: count(PairStatus::Ignored),
            pairs: reports,
        };
        info!(
            "Done: {} good, {} skipped, {} ignored of {} pairs",
            report.good, report.skipped, report.ignored, total
        );
        Ok(report)
    }
}
