//! Ingest command - count a corpus into an n-gram index

use super::{ctrl_c_token, tokenizers};
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use ngramlab::config::IngestConfig;
use ngramlab::ingest::{IngestError, InputFormat, Ingestor};
use ngramlab::store::{NgramIndex, OpenMode};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn run(
    language: &str,
    input: &Path,
    output_dir: &Path,
    config: IngestConfig,
    counts: bool,
    quiet: bool,
) -> Result<()> {
    let (sentence_tokenizer, word_tokenizer) = tokenizers(language)?;
    if !input.exists() {
        anyhow::bail!("Input does not exist: {}", input.display());
    }
    let start = Instant::now();

    let index = NgramIndex::open(output_dir, OpenMode::ReadWrite)
        .with_context(|| format!("Failed to open n-gram index at {}", output_dir.display()))?;
    info!(
        "Ingesting {} into {} (cache limit {}, {:?} total token count)",
        input.display(),
        output_dir.display(),
        config.cache_limit,
        config.total_token_policy
    );

    let mut ingestor = Ingestor::new(
        &index,
        config,
        sentence_tokenizer,
        word_tokenizer,
        ctrl_c_token(),
    );
    if !quiet {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(create_spinner_style());
        spinner.set_message(format!("Indexing {}...", input.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        ingestor = ingestor.with_progress(spinner);
    }

    ingestor.begin()?;
    let format = counts.then_some(InputFormat::Counts);
    let outcome = ingestor.ingest_path(input, format);
    let cancelled = matches!(outcome, Err(IngestError::Cancelled { .. }));
    if let Err(e) = outcome {
        if !cancelled {
            return Err(e).context("Ingest failed");
        }
    }
    let stats = ingestor.finish()?;
    index.close().context("Failed to close n-gram index")?;

    if cancelled {
        anyhow::bail!(
            "Interrupted after {} lines; n-grams counted so far were saved",
            stats.lines
        );
    }

    println!("\n{}", style("Ingest complete").bold());
    println!(
        "  Files: {} ({} unreadable)",
        style(stats.files).cyan(),
        stats.failed_files
    );
    println!(
        "  Lines: {}  Sentences: {}  Skipped lines: {}",
        style(stats.lines).cyan(),
        style(stats.sentences).cyan(),
        stats.skipped_lines
    );
    for (i, merged) in stats.merged.iter().enumerate() {
        println!("  {}-grams merged: {}", i + 1, style(merged).cyan());
    }
    println!("  Total token count: {}", style(stats.total_token_count).cyan());
    println!(
        "  Flushes: {}  Time: {:.1}s",
        stats.flushes,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
