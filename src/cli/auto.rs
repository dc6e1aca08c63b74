//! Auto command - evaluate every pair of a candidate file

use super::{check_inputs, ctrl_c_token, tokenizers, write_output};
use anyhow::{Context, Result};
use ngramlab::config::EvalConfig;
use ngramlab::confusion::{
    load_candidates, AutomaticEvaluator, ConfusionEvaluator, KnownSets, NgramConfusionClassifier,
};
use ngramlab::corpus::SentenceLoader;
use ngramlab::store::{NgramIndex, OpenMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub fn run(
    candidates: &Path,
    ngram_dir: &Path,
    inputs: Vec<PathBuf>,
    known_sets: Option<&Path>,
    language: &str,
    config: EvalConfig,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let (sentence_tokenizer, word_tokenizer) = tokenizers(language)?;
    check_inputs(&inputs)?;
    let pairs = load_candidates(candidates)
        .with_context(|| format!("Failed to read candidates from {}", candidates.display()))?;
    let known = match known_sets {
        Some(path) => KnownSets::load(path)
            .with_context(|| format!("Failed to read known sets from {}", path.display()))?,
        None => KnownSets::default(),
    };
    info!("{} candidate pair(s), {} known set(s)", pairs.len(), known.len());

    let index = NgramIndex::open(ngram_dir, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open n-gram index at {}", ngram_dir.display()))?;
    let classifier = NgramConfusionClassifier::new(&index, word_tokenizer);
    let loader = SentenceLoader::new(inputs, Arc::new(sentence_tokenizer))
        .with_max_sentences(config.max_sentences)
        .with_case_sensitive(config.case_sensitive);
    let evaluator = ConfusionEvaluator::new(&classifier, &loader, config.normalized_factors())
        .with_min_sentences(config.min_sentences)
        .with_case_sensitive(config.case_sensitive)
        .with_cancel(ctrl_c_token());
    let auto = AutomaticEvaluator::new(evaluator)
        .with_known_sets(known)
        .with_thresholds(config.min_precision, config.min_recall)
        .with_workers(config.workers);

    let report = auto.run(&pairs).context("Automatic evaluation aborted")?;

    let text = if format == "json" {
        serde_json::to_string_pretty(&report)?
    } else {
        report.text_lines().join("\n")
    };
    write_output(&text, output)
}
