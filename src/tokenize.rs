//! Sentence and word tokenization boundary
//!
//! Real tokenization is language-specific and lives outside this crate.
//! These traits are the seam; the `Simple*` implementations are good enough
//! for whitespace-delimited languages and for tests.

/// Splits running text into sentences.
pub trait SentenceTokenizer: Send + Sync {
    fn sentences(&self, text: &str) -> Vec<String>;
}

/// Splits a sentence into word tokens.
pub trait WordTokenizer: Send + Sync {
    fn tokens(&self, sentence: &str) -> Vec<String>;
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSentenceTokenizer;

impl SentenceTokenizer for SimpleSentenceTokenizer {
    fn sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((i, ch)) = chars.next() {
            if !matches!(ch, '.' | '!' | '?') {
                continue;
            }
            // "..." and "?!" stay with the sentence they end
            while let Some(&(_, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    chars.next();
                } else {
                    break;
                }
            }
            let end = chars.peek().map(|&(j, _)| j).unwrap_or(text.len());
            let at_boundary = chars.peek().map_or(true, |&(_, c)| c.is_whitespace());
            if at_boundary && end > i {
                push_trimmed(&mut sentences, &text[start..end]);
                start = end;
            }
        }
        push_trimmed(&mut sentences, &text[start..]);
        sentences
    }
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Letters, digits and inner apostrophes form words; every other
/// non-whitespace character is a token of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleWordTokenizer;

impl WordTokenizer for SimpleWordTokenizer {
    fn tokens(&self, sentence: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut word = String::new();
        let mut chars = sentence.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch.is_alphanumeric() {
                word.push(ch);
            } else if (ch == '\'' || ch == '’')
                && !word.is_empty()
                && chars.peek().map_or(false, |c| c.is_alphanumeric())
            {
                word.push(ch);
            } else {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
                if !ch.is_whitespace() {
                    tokens.push(ch.to_string());
                }
            }
        }
        if !word.is_empty() {
            tokens.push(word);
        }
        tokens
    }
}

/// Tokenizer pair used for a language code.
///
/// Every language currently maps to the simple tokenizers; the code is still
/// validated so a typo on the command line fails before any work starts.
pub fn tokenizers_for(language: &str) -> Option<(SimpleSentenceTokenizer, SimpleWordTokenizer)> {
    let code = language.trim();
    let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase())
        || is_variant_code(code);
    valid.then_some((SimpleSentenceTokenizer, SimpleWordTokenizer))
}

/// `en-US`, `pt-BR`, ...
fn is_variant_code(code: &str) -> bool {
    let Some((lang, region)) = code.split_once('-') else {
        return false;
    };
    (2..=3).contains(&lang.len())
        && lang.chars().all(|c| c.is_ascii_lowercase())
        && (2..=3).contains(&region.len())
        && region.chars().all(|c| c.is_ascii_alphanumeric())
}
