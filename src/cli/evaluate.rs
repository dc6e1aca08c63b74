//! Evaluate command - precision/recall of one pair per factor

use super::{check_inputs, ctrl_c_token, tokenizers};
use anyhow::{Context, Result};
use console::style;
use ngramlab::config::EvalConfig;
use ngramlab::confusion::{ConfusionEvaluator, ConfusionPair, FactorReport, NgramConfusionClassifier};
use ngramlab::corpus::SentenceLoader;
use ngramlab::store::{NgramIndex, OpenMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[allow(clippy::too_many_arguments)]
pub fn run(
    word_a: &str,
    word_b: &str,
    bidirectional: bool,
    ngram_dir: &Path,
    inputs: Vec<PathBuf>,
    language: &str,
    config: EvalConfig,
    format: &str,
) -> Result<()> {
    let (sentence_tokenizer, word_tokenizer) = tokenizers(language)?;
    check_inputs(&inputs)?;
    let start = Instant::now();

    let index = NgramIndex::open(ngram_dir, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open n-gram index at {}", ngram_dir.display()))?;
    let classifier = NgramConfusionClassifier::new(&index, word_tokenizer);
    let loader = SentenceLoader::new(inputs.clone(), Arc::new(sentence_tokenizer))
        .with_max_sentences(config.max_sentences)
        .with_case_sensitive(config.case_sensitive);
    let evaluator = ConfusionEvaluator::new(&classifier, &loader, config.normalized_factors())
        .with_min_sentences(config.min_sentences)
        .with_case_sensitive(config.case_sensitive)
        .with_cancel(ctrl_c_token());

    let pair = ConfusionPair::new(word_a, word_b, bidirectional);
    if !bidirectional {
        println!("NOTE: only evaluating '{}' written where '{}' was meant", word_a, word_b);
    }
    let evaluation = evaluator
        .evaluate(&pair)
        .with_context(|| format!("Evaluation of {} failed", pair))?;

    if format == "json" {
        let factors: Vec<FactorReport> = evaluation.outcomes.iter().map(FactorReport::from).collect();
        let json = serde_json::json!({
            "pair": pair,
            "count_a": evaluation.count_a,
            "count_b": evaluation.count_b,
            "factors": factors,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!(
        "\nEvaluation results for {} with {} sentences:",
        style(pair.label()).bold(),
        evaluation.count_a + evaluation.count_b
    );
    println!("Inputs:       {:?}", inputs);
    println!("Case sensit.: {}", config.case_sensitive);
    for outcome in &evaluation.outcomes {
        let m = &outcome.matrix;
        println!();
        println!(
            "Factor: {} - {} false positives, {} false negatives, {} true positives, {} true negatives",
            outcome.factor, m.false_positives, m.false_negatives, m.true_positives, m.true_negatives
        );
        let line = outcome.summary();
        if outcome.passes(config.min_precision, config.min_recall) {
            println!("{}", style(line).green());
        } else {
            println!("{}", line);
        }
    }
    println!("\nTime: {}ms", start.elapsed().as_millis());
    Ok(())
}
