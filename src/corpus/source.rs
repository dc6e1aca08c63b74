//! Sentence sources over corpus files

use super::CorpusSentence;
use crate::tokenize::SentenceTokenizer;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A finite stream of sentences. Not restartable.
pub type SentenceSource = Box<dyn Iterator<Item = CorpusSentence> + Send>;

/// How a corpus file is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Running text, one or more sentences per line
    PlainText,
    /// Tatoeba export, `id<TAB>lang<TAB>text`
    Tatoeba,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let tabular = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("csv") | Some("tsv")
        );
        if tabular || name.contains("tatoeba") {
            SourceKind::Tatoeba
        } else {
            SourceKind::PlainText
        }
    }
}

/// Open `path` as a sentence source of the detected kind.
pub fn open_source(
    path: &Path,
    tokenizer: Arc<dyn SentenceTokenizer>,
) -> std::io::Result<SentenceSource> {
    let source: SentenceSource = match SourceKind::detect(path) {
        SourceKind::PlainText => Box::new(PlainTextSource::open(path, tokenizer)?),
        SourceKind::Tatoeba => Box::new(TatoebaSource::open(path)?),
    };
    Ok(source)
}

/// Source id used in `CorpusSentence::source`.
fn source_id(path: &Path) -> Arc<str> {
    Arc::from(path.display().to_string())
}

/// Splits each line of a text file into sentences
pub struct PlainTextSource {
    lines: Lines<BufReader<File>>,
    tokenizer: Arc<dyn SentenceTokenizer>,
    pending: VecDeque<String>,
    source: Arc<str>,
}

impl PlainTextSource {
    pub fn open(path: &Path, tokenizer: Arc<dyn SentenceTokenizer>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        debug!("Reading sentences from {}", path.display());
        Ok(Self {
            lines: BufReader::new(file).lines(),
            tokenizer,
            pending: VecDeque::new(),
            source: source_id(path),
        })
    }
}

impl Iterator for PlainTextSource {
    type Item = CorpusSentence;

    fn next(&mut self) -> Option<CorpusSentence> {
        loop {
            if let Some(text) = self.pending.pop_front() {
                return Some(CorpusSentence {
                    text,
                    source: Arc::clone(&self.source),
                });
            }
            match self.lines.next()? {
                Ok(line) => self.pending.extend(self.tokenizer.sentences(&line)),
                Err(e) => {
                    warn!("Stopped reading {}: {}", self.source, e);
                    return None;
                }
            }
        }
    }
}

/// Reads the text column of a Tatoeba sentence export
pub struct TatoebaSource {
    lines: Lines<BufReader<File>>,
    source: Arc<str>,
}

impl TatoebaSource {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        debug!("Reading Tatoeba sentences from {}", path.display());
        Ok(Self {
            lines: BufReader::new(file).lines(),
            source: source_id(path),
        })
    }
}

/// `id<TAB>lang<TAB>text` -> `text`
fn tatoeba_text(line: &str) -> Option<&str> {
    let mut parts = line.splitn(3, '\t');
    let _id = parts.next()?;
    let _lang = parts.next()?;
    let text = parts.next()?.trim();
    (!text.is_empty()).then_some(text)
}

impl Iterator for TatoebaSource {
    type Item = CorpusSentence;

    fn next(&mut self) -> Option<CorpusSentence> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if let Some(text) = tatoeba_text(&line) {
                        return Some(CorpusSentence {
                            text: text.to_string(),
                            source: Arc::clone(&self.source),
                        });
                    }
                }
                Err(e) => {
                    warn!("Stopped reading {}: {}", self.source, e);
                    return None;
                }
            }
        }
    }
}

/// Takes one sentence from each source in turn until all are exhausted
pub struct MixingSentenceSource {
    sources: Vec<SentenceSource>,
    next: usize,
}

impl MixingSentenceSource {
    pub fn new(sources: Vec<SentenceSource>) -> Self {
        Self { sources, next: 0 }
    }
}

impl Iterator for MixingSentenceSource {
    type Item = CorpusSentence;

    fn next(&mut self) -> Option<CorpusSentence> {
        while !self.sources.is_empty() {
            let i = self.next % self.sources.len();
            match self.sources[i].next() {
                Some(sentence) => {
                    self.next = i + 1;
                    return Some(sentence);
                }
                None => {
                    // the source at i is replaced by the next one, keep i
                    self.sources.remove(i);
                    self.next = i;
                }
            }
        }
        None
    }
}
