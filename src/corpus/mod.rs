//! Example sentence loading for evaluation
//!
//! Inputs are corpus files or directories of per-word example files
//! (`<dir>/<word>.txt`). `SentenceLoader::load` streams the sentences that
//! contain a word, de-duplicated and capped.

mod source;

pub use source::{
    open_source, MixingSentenceSource, PlainTextSource, SentenceSource, SourceKind, TatoebaSource,
};

use crate::tokenize::SentenceTokenizer;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One example sentence and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSentence {
    pub text: String,
    pub source: Arc<str>,
}

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("file with example sentences not found: {0}")]
    ExampleFileNotFound(PathBuf),

    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build a pattern for '{word}': {source}")]
    Pattern {
        word: String,
        #[source]
        source: regex::Error,
    },
}

/// Loads example sentences for a word from a fixed set of inputs
pub struct SentenceLoader {
    inputs: Vec<PathBuf>,
    tokenizer: Arc<dyn SentenceTokenizer>,
    max_sentences: usize,
    case_sensitive: bool,
}

impl SentenceLoader {
    pub fn new(inputs: Vec<PathBuf>, tokenizer: Arc<dyn SentenceTokenizer>) -> Self {
        Self {
            inputs,
            tokenizer,
            max_sentences: 1_000,
            case_sensitive: false,
        }
    }

    pub fn with_max_sentences(mut self, max: usize) -> Self {
        self.max_sentences = max;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Sentences containing `word` as a whole word.
    ///
    /// Files are opened up front so a missing example file fails here;
    /// reading is lazy.
    pub fn load(&self, word: &str) -> Result<MatchingSentences, CorpusError> {
        self.load_with_cancel(word, CancellationToken::new())
    }

    /// Like [`load`](Self::load), but scanning stops as soon as `cancel`
    /// is cancelled. Check [`MatchingSentences::is_cancelled`] afterwards to
    /// tell a cut-short scan from an exhausted one.
    pub fn load_with_cancel(
        &self,
        word: &str,
        cancel: CancellationToken,
    ) -> Result<MatchingSentences, CorpusError> {
        let mut sources = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let path = if input.is_dir() {
                let file = input.join(format!("{}.txt", word));
                if !file.is_file() {
                    return Err(CorpusError::ExampleFileNotFound(file));
                }
                file
            } else {
                input.clone()
            };
            let source = open_source(&path, Arc::clone(&self.tokenizer))
                .map_err(|source| CorpusError::Io { path: path.clone(), source })?;
            sources.push(source);
        }
        debug!("Loading sentences with '{}' from {} input(s)", word, sources.len());

        let inner: SentenceSource = if sources.len() == 1 {
            sources.remove(0)
        } else {
            Box::new(MixingSentenceSource::new(sources))
        };
        Ok(MatchingSentences {
            inner,
            pattern: word_pattern(word, self.case_sensitive)?,
            seen: FxHashSet::default(),
            remaining: self.max_sentences,
            cancel,
        })
    }
}

/// `word` as a whole word; `\b` is only used on sides where `word` starts
/// or ends with a word character.
pub(crate) fn word_pattern(word: &str, case_sensitive: bool) -> Result<Regex, CorpusError> {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    let left = if word.chars().next().is_some_and(is_word_char) { r"\b" } else { "" };
    let right = if word.chars().last().is_some_and(is_word_char) { r"\b" } else { "" };
    RegexBuilder::new(&format!("{}{}{}", left, regex::escape(word), right))
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|source| CorpusError::Pattern {
            word: word.to_string(),
            source,
        })
}

/// Lazy iterator returned by [`SentenceLoader::load`]
pub struct MatchingSentences {
    inner: SentenceSource,
    pattern: Regex,
    seen: FxHashSet<String>,
    remaining: usize,
    cancel: CancellationToken,
}

impl MatchingSentences {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Iterator for MatchingSentences {
    type Item = CorpusSentence;

    fn next(&mut self) -> Option<CorpusSentence> {
        if self.remaining == 0 {
            return None;
        }
        for sentence in self.inner.by_ref() {
            if self.cancel.is_cancelled() {
                return None;
            }
            if !self.pattern.is_match(&sentence.text) {
                continue;
            }
            if !self.seen.insert(sentence.text.clone()) {
                continue;
            }
            self.remaining -= 1;
            return Some(sentence);
        }
        None
    }
}
