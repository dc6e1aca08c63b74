//! Prob command - look up a pseudo-probability

use anyhow::{Context, Result};
use console::style;
use ngramlab::ngram::NGram;
use ngramlab::probability::ProbabilityEstimator;
use ngramlab::store::{NgramIndex, OpenMode};
use std::path::Path;

pub fn run(ngram_dir: &Path, tokens: &[String], json: bool) -> Result<()> {
    let ngram = NGram::new(tokens)
        .with_context(|| format!("Not a valid 1-3 token n-gram: {:?}", tokens))?;
    let index = NgramIndex::open(ngram_dir, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open n-gram index at {}", ngram_dir.display()))?;
    let prob = ProbabilityEstimator::new(&index)
        .probability(&ngram)
        .with_context(|| format!("Lookup of '{}' failed", ngram))?;

    if json {
        let out = serde_json::json!({ "ngram": ngram, "probability": prob });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "P({}) = {}  ({}/{}, {}-gram)",
        style(&ngram).bold(),
        style(format!("{:.6e}", prob.ratio)).cyan(),
        prob.numerator,
        prob.denominator,
        prob.order
    );
    if prob.order < ngram.order() {
        println!("  {}", style("backed off to a shorter context").dim());
    }
    Ok(())
}
