//! Confusion matrices, per-factor outcomes and report formatting

use super::ConfusionPair;
use serde::Serialize;

/// Classification counts for one factor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_negatives: u64,
}

impl ConfusionMatrix {
    /// Count one decision. `is_error` is the label, `flagged` the verdict.
    pub fn record(&mut self, flagged: bool, is_error: bool) {
        match (flagged, is_error) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
            (false, false) => self.true_negatives += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    fn ratio(num: u64, denom: u64) -> Option<f64> {
        (denom > 0).then(|| num as f64 / denom as f64)
    }

    pub fn precision(&self) -> Option<f64> {
        Self::ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> Option<f64> {
        Self::ratio(self.true_positives, self.true_positives + self.false_negatives)
    }
}

/// Weighted harmonic mean of precision and recall
pub fn f_measure(precision: f64, recall: f64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let denom = b2 * precision + recall;
    if denom == 0.0 {
        0.0
    } else {
        (1.0 + b2) * precision * recall / denom
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "n/a".to_string(), |r| format!("{:.3}", r))
}

/// Result of one pair at one factor
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub pair: ConfusionPair,
    pub factor: u64,
    pub matrix: ConfusionMatrix,
    /// Example sentences loaded for word A and word B
    pub count_a: usize,
    pub count_b: usize,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl EvalOutcome {
    /// TP/(TP+FP), or 0.0 when nothing was flagged.
    pub fn precision(&self) -> f64 {
        self.matrix.precision().unwrap_or(0.0)
    }

    pub fn precision_defined(&self) -> bool {
        self.matrix.precision().is_some()
    }

    /// TP/(TP+FN), or 0.0 when there were no erroneous sentences.
    pub fn recall(&self) -> f64 {
        self.matrix.recall().unwrap_or(0.0)
    }

    pub fn recall_defined(&self) -> bool {
        self.matrix.recall().is_some()
    }

    pub fn f05(&self) -> f64 {
        f_measure(self.precision(), self.recall(), 0.5)
    }

    /// `their; there; 1000;    # p=0.990, r=0.453, 412+523, 2026-10-17`
    ///
    /// Bidirectional pairs list their words alphabetically (counts follow
    /// their word); one-way pairs keep `a -> b`. An undefined precision or
    /// recall prints as `n/a`.
    pub fn summary(&self) -> String {
        let (words, first_count, second_count) = if self.pair.bidirectional {
            let swapped = self.pair.word_a() > self.pair.word_b();
            let (first, second) = self.pair.sorted_words();
            let counts = if swapped {
                (self.count_b, self.count_a)
            } else {
                (self.count_a, self.count_b)
            };
            (format!("{}; {}", first, second), counts.0, counts.1)
        } else {
            (self.pair.label(), self.count_a, self.count_b)
        };
        format!(
            "{}; {};    # p={}, r={}, {}+{}, {}",
            words,
            self.factor,
            format_ratio(self.matrix.precision()),
            format_ratio(self.matrix.recall()),
            first_count,
            second_count,
            self.date
        )
    }

    pub fn passes(&self, min_precision: f64, min_recall: f64) -> bool {
        self.precision_defined()
            && self.recall_defined()
            && self.precision() >= min_precision
            && self.recall() >= min_recall
    }
}

/// All factors evaluated for one pair
#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub pair: ConfusionPair,
    pub count_a: usize,
    pub count_b: usize,
    /// One per factor, ascending
    pub outcomes: Vec<EvalOutcome>,
}

impl PairEvaluation {
    /// Factors reaching both thresholds, ascending.
    pub fn best(&self, min_precision: f64, min_recall: f64) -> Vec<&EvalOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.passes(min_precision, min_recall))
            .collect()
    }
}

/// Serializable view of an outcome; undefined ratios become `null`
#[derive(Debug, Clone, Serialize)]
pub struct FactorReport {
    pub factor: u64,
    #[serde(flatten)]
    pub matrix: ConfusionMatrix,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f05: f64,
    pub summary: String,
}

impl From<&EvalOutcome> for FactorReport {
    fn from(o: &EvalOutcome) -> Self {
        Self {
            factor: o.factor,
            matrix: o.matrix,
            precision: o.matrix.precision(),
            recall: o.matrix.recall(),
            f05: o.f05(),
            summary: o.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(pair: ConfusionPair, matrix: ConfusionMatrix) -> EvalOutcome {
        EvalOutcome {
            pair,
            factor: 100,
            matrix,
            count_a: 412,
            count_b: 523,
            date: "2026-10-17".to_string(),
        }
    }

    fn matrix(tp: u64, fp: u64, fn_: u64, tn: u64) -> ConfusionMatrix {
        ConfusionMatrix {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
        }
    }

    #[test]
    fn test_record() {
        let mut m = ConfusionMatrix::default();
        m.record(true, true);
        m.record(true, false);
        m.record(false, true);
        m.record(false, false);
        m.record(false, false);
        assert_eq!(m, matrix(1, 1, 1, 2));
        assert_eq!(m.total(), 5);
    }

    #[test]
    fn test_precision_recall() {
        let o = outcome(ConfusionPair::new("there", "their", true), matrix(9, 1, 3, 20));
        assert!((o.precision() - 0.9).abs() < 1e-12);
        assert!((o.recall() - 0.75).abs() < 1e-12);
        assert!(o.f05() > 0.85 && o.f05() < 0.87);
    }

    #[test]
    fn test_undefined_ratios_are_zero_not_nan() {
        let o = outcome(ConfusionPair::new("a", "b", true), matrix(0, 0, 0, 10));
        assert_eq!(o.precision(), 0.0);
        assert_eq!(o.recall(), 0.0);
        assert!(!o.precision_defined());
        assert!(!o.recall_defined());
        assert_eq!(o.f05(), 0.0);
        assert!(!o.passes(0.0, 0.0));
    }

    #[test]
    fn test_summary_sorted_for_bidirectional() {
        let o = outcome(ConfusionPair::new("there", "their", true), matrix(1, 0, 1, 0));
        assert_eq!(
            o.summary(),
            "their; there; 100;    # p=1.000, r=0.500, 523+412, 2026-10-17"
        );
    }

    #[test]
    fn test_summary_marks_undefined_ratios() {
        // nothing flagged: precision undefined, recall a real zero
        let o = outcome(ConfusionPair::new("there", "their", false), matrix(0, 0, 4, 6));
        assert_eq!(
            o.summary(),
            "there -> their; 100;    # p=n/a, r=0.000, 412+523, 2026-10-17"
        );

        let o = outcome(ConfusionPair::new("there", "their", false), matrix(0, 2, 0, 6));
        assert_eq!(
            o.summary(),
            "there -> their; 100;    # p=0.000, r=n/a, 412+523, 2026-10-17"
        );
    }

    #[test]
    fn test_summary_one_way() {
        let o = outcome(ConfusionPair::new("there", "their", false), matrix(1, 0, 1, 0));
        assert_eq!(
            o.summary(),
            "there -> their; 100;    # p=1.000, r=0.500, 412+523, 2026-10-17"
        );
    }

    #[test]
    fn test_best_filters_thresholds() {
        let pair = ConfusionPair::new("a", "b", true);
        let mut low = outcome(pair.clone(), matrix(50, 10, 50, 100));
        low.factor = 10;
        let mut good = outcome(pair.clone(), matrix(50, 1, 50, 100));
        good.factor = 100;
        let mut no_recall = outcome(pair.clone(), matrix(1, 0, 99, 100));
        no_recall.factor = 1000;
        let eval = PairEvaluation {
            pair,
            count_a: 100,
            count_b: 100,
            outcomes: vec![low, good, no_recall],
        };
        let best: Vec<u64> = eval.best(0.95, 0.10).iter().map(|o| o.factor).collect();
        assert_eq!(best, vec![100]);
    }

    #[test]
    fn test_factor_report_json() {
        let o = outcome(ConfusionPair::new("a", "b", true), matrix(0, 0, 2, 3));
        let json = serde_json::to_value(FactorReport::from(&o)).unwrap();
        assert_eq!(json["precision"], serde_json::Value::Null);
        assert_eq!(json["recall"], 0.0);
        assert_eq!(json["false_negatives"], 2);
    }
}
