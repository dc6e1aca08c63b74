//! Streaming corpus ingestion into the n-gram index
//!
//! A reader thread streams input lines through a bounded channel; the
//! counting side splits them into sentences, extracts 1/2/3-grams and
//! accumulates per-order pending batches. When any batch grows past
//! `cache_limit` entries, every batch is merged into its store, the stores
//! are refreshed (durable) and the batches are cleared.
//!
//! ```text
//!   files ──> reader thread ──(bounded channel)──> counter ──> pending batches
//!                                                                  │ limit
//!                                                                  v
//!                                               merge_batch + refresh per order
//! ```
//!
//! A crash between flushes loses only the pending batches; everything
//! flushed before is durable.

mod reader;

use crate::config::{IngestConfig, TotalTokenPolicy};
use crate::ngram::{NgramExtractor, MAX_ORDER};
use crate::store::{NgramIndex, StoreError};
use crate::tokenize::{SentenceTokenizer, WordTokenizer};
use indicatif::ProgressBar;
use reader::{collect_input_files, spawn_reader, ReadEvent};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that stop an ingest run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("failed to list input files in {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ingest cancelled after {lines} lines (pending n-grams were flushed)")]
    Cancelled { lines: u64 },
}

/// What an input file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Running text, sentences are split and tokenized here
    Text,
    /// Pre-aggregated `ngram<TAB>count` lines
    Counts,
}

impl InputFormat {
    /// `.tsv` files are count files, everything else is text.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") => InputFormat::Counts,
            _ => InputFormat::Text,
        }
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files: u64,
    pub failed_files: u64,
    pub lines: u64,
    pub bytes: u64,
    pub sentences: u64,
    pub skipped_lines: u64,
    pub flushes: u64,
    /// Entries merged into each order's store, summed over all flushes
    pub merged: [u64; MAX_ORDER],
    pub total_token_count: u64,
}

/// Single-writer ingest session over an open index
pub struct Ingestor<'a, S, W> {
    index: &'a NgramIndex,
    config: IngestConfig,
    extractor: NgramExtractor,
    sentence_tokenizer: S,
    word_tokenizer: W,
    batches: [FxHashMap<String, u64>; MAX_ORDER],
    stats: IngestStats,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl<'a, S: SentenceTokenizer, W: WordTokenizer> Ingestor<'a, S, W> {
    pub fn new(
        index: &'a NgramIndex,
        config: IngestConfig,
        sentence_tokenizer: S,
        word_tokenizer: W,
        cancel: CancellationToken,
    ) -> Self {
        let extractor = NgramExtractor::new(config.max_token_length);
        Self {
            index,
            config,
            extractor,
            sentence_tokenizer,
            word_tokenizer,
            batches: Default::default(),
            stats: IngestStats::default(),
            cancel,
            progress: None,
        }
    }

    /// Report progress on a spinner as well as in the log.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Number of entries waiting in the batch for `order`.
    pub fn pending(&self, order: usize) -> usize {
        order
            .checked_sub(1)
            .and_then(|i| self.batches.get(i))
            .map_or(0, |b| b.len())
    }

    /// Flush the empty batches once so the stores and the total token count
    /// record exist before the first real flush.
    pub fn begin(&mut self) -> Result<(), IngestError> {
        self.flush()
    }

    /// Ingest a file or every file below a directory.
    ///
    /// Unreadable files are logged and skipped; store errors abort.
    pub fn ingest_path(&mut self, input: &Path, format: Option<InputFormat>) -> Result<(), IngestError> {
        let files = collect_input_files(input)?;
        info!("Ingesting {} file(s) from {}", files.len(), input.display());

        let (events, handle) = spawn_reader(files, self.config.channel_capacity.max(1));
        let mut result = Ok(());
        let mut current_format = format.unwrap_or(InputFormat::Text);

        for event in events.iter() {
            match event {
                ReadEvent::FileStart(path) => {
                    self.stats.files += 1;
                    current_format = format.unwrap_or_else(|| InputFormat::detect(&path));
                    debug!("Reading {} as {:?}", path.display(), current_format);
                }
                ReadEvent::Line(line) => {
                    if let Err(e) = self.ingest_line(&line, current_format) {
                        result = Err(e);
                        break;
                    }
                }
                ReadEvent::Failed { path, error } => {
                    self.stats.failed_files += 1;
                    warn!("Skipping rest of {}: {}", path.display(), error);
                }
            }
        }
        // Dropping the receiver stops the reader if we broke out early
        drop(events);
        if handle.join().is_err() {
            warn!("Input reader thread panicked");
        }
        result
    }

    fn ingest_line(&mut self, line: &str, format: InputFormat) -> Result<(), IngestError> {
        if self.cancel.is_cancelled() {
            return self.cancelled();
        }
        self.stats.lines += 1;
        self.stats.bytes += line.len() as u64;
        if self.stats.lines % self.config.progress_every.max(1) == 0 {
            self.report_progress();
        }

        match format {
            InputFormat::Text => {
                for sentence in self.sentence_tokenizer.sentences(line) {
                    if self.cancel.is_cancelled() {
                        return self.cancelled();
                    }
                    let tokens = self.word_tokenizer.tokens(&sentence);
                    self.add_sentence(&tokens);
                    self.flush_if_full()?;
                }
            }
            InputFormat::Counts => {
                match parse_count_line(line) {
                    Some((key, count)) => self.add_count(key, count),
                    None => {
                        if !line.trim().is_empty() {
                            self.stats.skipped_lines += 1;
                            debug!("Skipping malformed count line: {}", line);
                        }
                    }
                }
                self.flush_if_full()?;
            }
        }
        Ok(())
    }

    /// Count every n-gram of one tokenized sentence.
    pub fn add_sentence<T: AsRef<str>>(&mut self, tokens: &[T]) {
        self.stats.sentences += 1;
        let batches = &mut self.batches;
        self.extractor.visit(tokens, |order, key| {
            *batches[order - 1].entry(key).or_insert(0) += 1;
        });
    }

    /// Add a pre-aggregated count. The order is the number of tokens; keys
    /// with an unsupported order or an over-long token are skipped.
    pub fn add_count(&mut self, key: &str, count: u64) {
        let tokens: Vec<&str> = key.split_whitespace().collect();
        if tokens.is_empty() || tokens.len() > MAX_ORDER {
            self.stats.skipped_lines += 1;
            return;
        }
        if tokens
            .iter()
            .any(|t| t.chars().count() > self.extractor.max_token_length())
        {
            self.stats.skipped_lines += 1;
            return;
        }
        *self.batches[tokens.len() - 1]
            .entry(tokens.join(" "))
            .or_insert(0) += count;
    }

    fn flush_if_full(&mut self) -> Result<(), IngestError> {
        if self.batches.iter().any(|b| b.len() > self.config.cache_limit) {
            self.flush()?;
        }
        Ok(())
    }

    /// Merge all pending batches into their stores, make them durable and
    /// clear them.
    pub fn flush(&mut self) -> Result<(), IngestError> {
        let start = Instant::now();
        for (batch, store) in self.batches.iter_mut().zip(self.index.stores()) {
            let order = store.order();
            debug!("Writing {} cached {}-grams", batch.len(), order);

            store.merge_batch(batch.iter().map(|(k, v)| (k.as_str(), *v)))?;
            self.stats.merged[order - 1] += batch.len() as u64;

            if order == 1 {
                let batch_sum: u64 = batch.values().sum();
                let total = match self.config.total_token_policy {
                    TotalTokenPolicy::Running => store.total_token_count()?.saturating_add(batch_sum),
                    TotalTokenPolicy::LastBatch => batch_sum,
                };
                store.set_total_token_count(total)?;
                self.stats.total_token_count = total;
                debug!("Total token count now {} (batch sum {})", total, batch_sum);
            }
            batch.clear();
        }
        self.index.refresh()?;
        self.stats.flushes += 1;
        info!(
            "Flush {} done in {}ms",
            self.stats.flushes,
            start.elapsed().as_millis()
        );
        Ok(())
    }

    fn cancelled(&mut self) -> Result<(), IngestError> {
        warn!("Cancellation requested, flushing pending n-grams");
        self.flush()?;
        Err(IngestError::Cancelled {
            lines: self.stats.lines,
        })
    }

    fn report_progress(&self) {
        let mb = self.stats.bytes as f64 / 1000.0 / 1000.0;
        info!("Indexing line {} ({:.2}MB)", self.stats.lines, mb);
        if let Some(pb) = &self.progress {
            pb.set_message(format!("line {} ({:.2}MB)", self.stats.lines, mb));
            pb.tick();
        }
    }

    /// Flush what is left and return the run's counters.
    pub fn finish(mut self) -> Result<IngestStats, IngestError> {
        self.flush()?;
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        Ok(self.stats)
    }
}

/// Parse `ngram<TAB>count`. The count is the last tab-separated field.
fn parse_count_line(line: &str) -> Option<(&str, u64)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let tab = memchr::memrchr(b'\t', line.as_bytes())?;
    let key = line[..tab].trim();
    let count = line[tab + 1..].trim().parse().ok()?;
    if key.is_empty() {
        return None;
    }
    Some((key, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngram::NGram;
    use crate::store::{NgramCounts, OpenMode};
    use crate::tokenize::{SimpleSentenceTokenizer, SimpleWordTokenizer};
    use tempfile::tempdir;

    fn ingestor(index: &NgramIndex, config: IngestConfig) -> Ingestor<'_, SimpleSentenceTokenizer, SimpleWordTokenizer> {
        Ingestor::new(
            index,
            config,
            SimpleSentenceTokenizer,
            SimpleWordTokenizer,
            CancellationToken::new(),
        )
    }

    fn count(index: &NgramIndex, key: &str) -> u64 {
        index.count(&NGram::parse(key).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_count_line() {
        assert_eq!(parse_count_line("over there\t42"), Some(("over there", 42)));
        assert_eq!(parse_count_line("x\t7\r\n"), Some(("x", 7)));
        assert_eq!(parse_count_line("no count"), None);
        assert_eq!(parse_count_line("x\tmany"), None);
        assert_eq!(parse_count_line("\t3"), None);
    }

    #[test]
    fn test_flush_at_limit_does_not_double_count() {
        let dir = tempdir().unwrap();
        let index = NgramIndex::open(dir.path(), OpenMode::ReadWrite).unwrap();
        let config = IngestConfig {
            cache_limit: 2,
            ..Default::default()
        };
        let mut ing = ingestor(&index, config);
        ing.begin().unwrap();
        for _ in 0..5 {
            ing.add_sentence(&["over", "there"]);
            ing.flush_if_full().unwrap();
        }
        let stats = ing.finish().unwrap();
        assert!(stats.flushes >= 3);
        assert_eq!(count(&index, "over there"), 5);
        assert_eq!(count(&index, "_START_ over there"), 5);
        assert_eq!(count(&index, "_END_"), 5);
    }

    #[test]
    fn test_total_token_count_running() {
        let dir = tempdir().unwrap();
        let index = NgramIndex::open(dir.path(), OpenMode::ReadWrite).unwrap();
        let mut ing = ingestor(&index, IngestConfig::default());
        ing.begin().unwrap();
        ing.add_sentence(&["a", "b"]);
        ing.flush().unwrap();
        ing.add_sentence(&["c"]);
        ing.finish().unwrap();
        // (START a b END) + (START c END)
        assert_eq!(index.total_token_count().unwrap(), 7);
    }

    #[test]
    fn test_total_token_count_last_batch() {
        let dir = tempdir().unwrap();
        let index = NgramIndex::open(dir.path(), OpenMode::ReadWrite).unwrap();
        let config = IngestConfig {
            total_token_policy: TotalTokenPolicy::LastBatch,
            ..Default::default()
        };
        let mut ing = ingestor(&index, config);
        ing.add_sentence(&["a", "b"]);
        ing.flush().unwrap();
        ing.add_sentence(&["c"]);
        ing.finish().unwrap();
        assert_eq!(index.total_token_count().unwrap(), 3);
    }

    #[test]
    fn test_long_tokens_never_stored() {
        let dir = tempdir().unwrap();
        let index = NgramIndex::open(dir.path(), OpenMode::ReadWrite).unwrap();
        let long = "x".repeat(25);
        let mut ing = ingestor(&index, IngestConfig::default());
        ing.add_sentence(&["see", long.as_str(), "here"]);
        ing.add_count(&format!("a {}", long), 10);
        let stats = ing.finish().unwrap();
        assert_eq!(stats.skipped_lines, 1);

        for order in 1..=3 {
            let store = index.store(order).unwrap();
            assert_eq!(store.get_key(&long).unwrap_or(0), 0);
        }
        assert_eq!(count(&index, "see"), 1);
        assert_eq!(count(&index, "_START_ see"), 1);
        assert_eq!(count(&index, "here _END_"), 1);
    }

    #[test]
    fn test_ingest_text_file_and_bad_file() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        std::fs::write(corpus.join("a.txt"), "Over there. Over there!\nTheir car.\n").unwrap();
        // invalid UTF-8: skipped, the run continues
        std::fs::write(corpus.join("b.txt"), [0xff, 0xfe, 0x00, b'\n']).unwrap();

        let index = NgramIndex::open(&dir.path().join("index"), OpenMode::ReadWrite).unwrap();
        let mut ing = ingestor(&index, IngestConfig::default());
        ing.begin().unwrap();
        ing.ingest_path(&corpus, None).unwrap();
        let stats = ing.finish().unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.sentences, 3);
        assert_eq!(count(&index, "Over there"), 2);
        assert_eq!(count(&index, "Their car"), 1);
    }

    #[test]
    fn test_ingest_count_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("counts.tsv");
        std::fs::write(&input, "the\t55\nthe nice\t3\nthe nice building\t1\nbroken line\nthe\t5\n").unwrap();

        let index = NgramIndex::open(&dir.path().join("index"), OpenMode::ReadWrite).unwrap();
        let mut ing = ingestor(&index, IngestConfig::default());
        ing.ingest_path(&input, None).unwrap();
        let stats = ing.finish().unwrap();

        assert_eq!(stats.skipped_lines, 1);
        assert_eq!(count(&index, "the"), 60);
        assert_eq!(count(&index, "the nice"), 3);
        assert_eq!(count(&index, "the nice building"), 1);
        assert_eq!(index.total_token_count().unwrap(), 60);
    }

    #[test]
    fn test_cancel_flushes_pending() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "one line\n").unwrap();
        let index = NgramIndex::open(&dir.path().join("index"), OpenMode::ReadWrite).unwrap();

        let cancel = CancellationToken::new();
        let mut ing = Ingestor::new(
            &index,
            IngestConfig::default(),
            SimpleSentenceTokenizer,
            SimpleWordTokenizer,
            cancel.clone(),
        );
        ing.add_sentence(&["kept"]);
        cancel.cancel();
        let err = ing.ingest_path(&input, None).unwrap_err();
        assert!(matches!(err, IngestError::Cancelled { lines: 0 }));
        assert_eq!(count(&index, "kept"), 1);
    }

    #[test]
    fn test_missing_input() {
        let dir = tempdir().unwrap();
        let index = NgramIndex::open(&dir.path().join("index"), OpenMode::ReadWrite).unwrap();
        let mut ing = ingestor(&index, IngestConfig::default());
        let err = ing.ingest_path(&dir.path().join("missing.txt"), None).unwrap_err();
        assert!(matches!(err, IngestError::InputNotFound(_)));
    }
}
