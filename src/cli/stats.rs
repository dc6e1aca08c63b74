//! Stats command - record counts of an index

use anyhow::{Context, Result};
use console::style;
use ngramlab::store::{NgramCounts, NgramIndex, OpenMode};
use std::path::Path;

pub fn run(ngram_dir: &Path, json: bool) -> Result<()> {
    let index = NgramIndex::open(ngram_dir, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open n-gram index at {}", ngram_dir.display()))?;
    let stats = index.stats().context("Failed to read store statistics")?;
    let total = index
        .total_token_count()
        .context("Failed to read the total token count")?;

    if json {
        let out = serde_json::json!({ "orders": stats, "total_token_count": total });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("\nN-gram index {}\n", style(ngram_dir.display()).cyan());
    for s in &stats {
        println!(
            "  {}-grams: {} distinct, {} occurrences",
            s.order,
            style(s.distinct_ngrams).cyan(),
            s.occurrences
        );
    }
    println!("  Total token count: {}", style(total).cyan());
    Ok(())
}
