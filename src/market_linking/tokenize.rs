//! Tokenization of normalized text
//!
//! ASCII alphanumeric runs become single tokens. CJK script has no word
//! boundaries, so a CJK run contributes itself plus every substring of
//! length `1..=min(max_ngram, run_len)`; a short entity term then matches
//! anywhere inside a longer unsegmented run.

use std::collections::HashSet;

use super::normalize::{is_cjk, normalize_for_match, NormalizedText};

/// Deduplicated token set that remembers first-occurrence order.
///
/// Membership drives scoring; the order drives candidate iteration so that
/// repeated calls on the same text visit candidates identically.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str) {
        if token.is_empty() || self.seen.contains(token) {
            return;
        }
        self.seen.insert(token.to_string());
        self.order.push(token.to_string());
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool {
        self.seen.contains(token)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tokens in first-occurrence order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }
}

/// A passage ready for scoring
#[derive(Debug, Clone)]
pub struct TokenizedText {
    pub raw: String,
    pub plain: String,
    pub tokens: TokenSet,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Ascii,
    Cjk,
}

/// Normalize and tokenize a passage.
pub fn tokenize(text: &str, max_ngram: usize) -> TokenizedText {
    let NormalizedText { raw, plain } = normalize_for_match(text);
    let tokens = tokenize_plain(&plain, max_ngram);
    TokenizedText { raw, plain, tokens }
}

/// Tokenize an already-normalized `plain` projection.
pub fn tokenize_plain(plain: &str, max_ngram: usize) -> TokenSet {
    let mut tokens = TokenSet::new();
    let mut current = String::new();
    let mut kind: Option<RunKind> = None;

    for c in plain.chars() {
        let next = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            Some(RunKind::Ascii)
        } else if is_cjk(c) {
            Some(RunKind::Cjk)
        } else {
            None
        };

        if next != kind && !current.is_empty() {
            flush_run(&mut tokens, &current, kind, max_ngram);
            current.clear();
        }
        if next.is_some() {
            current.push(c);
        }
        kind = next;
    }
    if !current.is_empty() {
        flush_run(&mut tokens, &current, kind, max_ngram);
    }

    tokens
}

fn flush_run(tokens: &mut TokenSet, run: &str, kind: Option<RunKind>, max_ngram: usize) {
    match kind {
        Some(RunKind::Cjk) => add_cjk_ngrams(tokens, run, max_ngram),
        _ => tokens.insert(run),
    }
}

fn add_cjk_ngrams(tokens: &mut TokenSet, run: &str, max_ngram: usize) {
    tokens.insert(run);
    let chars: Vec<char> = run.chars().collect();
    let max_n = max_ngram.min(chars.len());
    for n in 1..=max_n {
        for window in chars.windows(n) {
            let gram: String = window.iter().collect();
            tokens.insert(&gram);
        }
    }
}

/// Char offset of the first occurrence of `needle` in `haystack` that sits on
/// token boundaries (start/end of text or a space on each side).
pub fn find_token_boundary(haystack: &str, needle: &str) -> Option<usize> {
    if haystack.is_empty() || needle.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(needle) {
        let idx = from + rel;
        let end = idx + needle.len();
        let before_ok = idx == 0 || bytes[idx - 1] == b' ';
        let after_ok = end == haystack.len() || bytes[end] == b' ';
        if before_ok && after_ok {
            return Some(haystack[..idx].chars().count());
        }
        // Advance by one char to keep slicing on UTF-8 boundaries
        from = idx
            + haystack[idx..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
    }
    None
}

/// Whether 2-3 keyword tokens all occur on token boundaries within the
/// configured char span of each other.
pub fn tokens_near(plain: &str, keyword_tokens: &[String], span_two: usize, span_three: usize) -> bool {
    let tokens: Vec<&str> = keyword_tokens
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    let limit = match tokens.len() {
        2 => span_two,
        3 => span_three,
        _ => return false,
    };

    let mut min = usize::MAX;
    let mut max = 0;
    for token in tokens {
        match find_token_boundary(plain, token) {
            Some(pos) => {
                min = min.min(pos);
                max = max.max(pos);
            }
            None => return false,
        }
    }
    max - min <= limit
}
