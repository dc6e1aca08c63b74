//! Confusion pairs and the candidate / known-set file formats
//!
//! One pair or chain per line, words separated by `;` (both directions) or
//! `->` (one way). A `|description` suffix on a word is kept as its
//! description; `#` starts a comment. `a; b; c` expands to `a; b` and `b; c`.

use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// A word of a pair, with an optional human description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConfusionString {
    pub text: String,
    pub description: Option<String>,
}

impl ConfusionString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: None,
        }
    }

    /// `word|description` -> word + description
    fn parse(field: &str) -> Self {
        match field.split_once('|') {
            Some((text, desc)) => {
                let desc = desc.trim();
                Self {
                    text: text.trim().to_string(),
                    description: (!desc.is_empty()).then(|| desc.to_string()),
                }
            }
            None => Self::new(field.trim()),
        }
    }
}

/// Two easily confused words
///
/// A one-way pair `a -> b` only covers `a` written where `b` was meant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConfusionPair {
    pub a: ConfusionString,
    pub b: ConfusionString,
    pub bidirectional: bool,
}

impl ConfusionPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>, bidirectional: bool) -> Self {
        Self {
            a: ConfusionString::new(a),
            b: ConfusionString::new(b),
            bidirectional,
        }
    }

    pub fn word_a(&self) -> &str {
        &self.a.text
    }

    pub fn word_b(&self) -> &str {
        &self.b.text
    }

    /// The word that may replace `written`, if `written` may be flagged.
    pub fn alternative_for(&self, written: &str) -> Option<&str> {
        if written == self.a.text {
            Some(&self.b.text)
        } else if self.bidirectional && written == self.b.text {
            Some(&self.a.text)
        } else {
            None
        }
    }

    /// `a; b` (alphabetical) or `a -> b`
    pub fn label(&self) -> String {
        if self.bidirectional {
            let (first, second) = self.sorted_words();
            format!("{}; {}", first, second)
        } else {
            format!("{} -> {}", self.a.text, self.b.text)
        }
    }

    pub(crate) fn sorted_words(&self) -> (&str, &str) {
        if self.a.text <= self.b.text {
            (&self.a.text, &self.b.text)
        } else {
            (&self.b.text, &self.a.text)
        }
    }
}

impl std::fmt::Display for ConfusionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.a.text, self.b.text)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct CandidateParseError {
    pub line: usize,
    pub reason: String,
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before).trim()
}

/// Parse one line. `Ok(None)` for blank and comment-only lines.
pub fn parse_candidate_line(line: &str, line_no: usize) -> Result<Option<Vec<ConfusionPair>>, CandidateParseError> {
    let content = strip_comment(line);
    if content.is_empty() {
        return Ok(None);
    }
    let err = |reason: String| CandidateParseError { line: line_no, reason };

    let one_way = content.contains("->");
    let fields: Vec<&str> = if one_way {
        content.split("->").collect()
    } else {
        content.split(';').collect()
    };
    if one_way && content.contains(';') {
        return Err(err("mixes ';' and '->' separators".to_string()));
    }
    if fields.len() < 2 {
        return Err(err(format!(
            "expected words separated by ';' or '->': {}",
            content
        )));
    }

    let words: Vec<ConfusionString> = fields.iter().map(|f| ConfusionString::parse(f)).collect();
    if let Some(bad) = words.iter().find(|w| w.text.is_empty()) {
        return Err(err(format!("empty word in '{}' ({:?})", content, bad)));
    }

    let mut pairs = Vec::with_capacity(words.len() - 1);
    for window in words.windows(2) {
        if window[0].text == window[1].text {
            return Err(err(format!("'{}' paired with itself", window[0].text)));
        }
        pairs.push(ConfusionPair {
            a: window[0].clone(),
            b: window[1].clone(),
            bidirectional: !one_way,
        });
    }
    Ok(Some(pairs))
}

/// Parse a whole candidate file; malformed lines are logged and skipped.
pub fn parse_candidates(content: &str) -> Vec<ConfusionPair> {
    let mut pairs = Vec::new();
    for (i, line) in content.lines().enumerate() {
        match parse_candidate_line(line, i + 1) {
            Ok(Some(mut p)) => pairs.append(&mut p),
            Ok(None) => {}
            Err(e) => warn!("Skipping candidate {}", e),
        }
    }
    debug!("Parsed {} confusion pair(s)", pairs.len());
    pairs
}

pub fn load_candidates(path: &Path) -> std::io::Result<Vec<ConfusionPair>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_candidates(&content))
}

/// Pairs that are already covered by existing confusion sets
#[derive(Debug, Default, Clone)]
pub struct KnownSets {
    sets: Vec<FxHashSet<String>>,
}

impl KnownSets {
    /// Lines like `their; there; 10` or `a -> b; 100`. Numeric fields
    /// (thresholds) are ignored, every other field is a member of the set.
    pub fn parse(content: &str) -> Self {
        let mut sets = Vec::new();
        for line in content.lines() {
            let content = strip_comment(line);
            if content.is_empty() {
                continue;
            }
            let set: FxHashSet<String> = content
                .split(';')
                .flat_map(|field| field.split("->"))
                .map(|field| ConfusionString::parse(field).text)
                .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
                .collect();
            if set.len() >= 2 {
                sets.push(set);
            }
        }
        Self { sets }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// True if one known set contains both words of the pair.
    pub fn contains(&self, pair: &ConfusionPair) -> bool {
        self.sets
            .iter()
            .any(|set| set.contains(pair.word_a()) && set.contains(pair.word_b()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_line() {
        let pairs = parse_candidate_line("there; their", 1).unwrap().unwrap();
        assert_eq!(pairs, vec![ConfusionPair::new("there", "their", true)]);
        assert_eq!(pairs[0].label(), "their; there");
    }

    #[test]
    fn test_one_way_with_descriptions() {
        let pairs = parse_candidate_line("affect|verb -> effect|noun  # common", 3)
            .unwrap()
            .unwrap();
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert!(!pair.bidirectional);
        assert_eq!(pair.word_a(), "affect");
        assert_eq!(pair.a.description.as_deref(), Some("verb"));
        assert_eq!(pair.label(), "affect -> effect");
        assert_eq!(pair.alternative_for("affect"), Some("effect"));
        assert_eq!(pair.alternative_for("effect"), None);
    }

    #[test]
    fn test_chain_expands_to_consecutive_pairs() {
        let pairs = parse_candidate_line("to; too; two", 1).unwrap().unwrap();
        assert_eq!(
            pairs,
            vec![
                ConfusionPair::new("to", "too", true),
                ConfusionPair::new("too", "two", true)
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_candidate_line("   ", 1), Ok(None));
        assert_eq!(parse_candidate_line("# nothing here", 2), Ok(None));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_candidate_line("lonely", 1).is_err());
        assert!(parse_candidate_line("a; ", 2).is_err());
        assert!(parse_candidate_line("a; a", 3).is_err());
        let err = parse_candidate_line("a -> b; c", 4).unwrap_err();
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_parse_candidates_skips_bad_lines() {
        let pairs = parse_candidates("there; their\nbroken\n\nloose -> lose\n");
        assert_eq!(pairs.len(), 2);
        assert!(!pairs[1].bidirectional);
    }

    #[test]
    fn test_known_sets() {
        let known = KnownSets::parse("their; there; 10\n# comment\nlose -> loose; 100\n");
        assert_eq!(known.len(), 2);
        assert!(known.contains(&ConfusionPair::new("there", "their", true)));
        assert!(known.contains(&ConfusionPair::new("loose", "lose", false)));
        assert!(!known.contains(&ConfusionPair::new("there", "they're", true)));
    }
}
