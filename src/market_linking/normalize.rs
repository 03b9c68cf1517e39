//! Text normalization for market matching
//!
//! Produces the two projections every match works on:
//! - `raw`: lowercase, whitespace-collapsed, punctuation preserved
//!   (used for `$TAG` / `#TAG` detection)
//! - `plain`: `raw` with everything but `[a-z0-9]` and CJK ideographs
//!   replaced by spaces (used for all token and phrase matching)
//!
//! Also handles social `@mentions`, which are stripped unless the handle is a
//! known entity term.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// `@handle` preceded by start-of-text or whitespace, ended by an ASCII word boundary
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|\s)@([a-z0-9_]{1,20})(?-u:\b)").expect("mention regex is valid")
});

/// CJK Unified Ideographs block
#[inline]
pub fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Chars that survive into the `plain` projection
#[inline]
pub fn is_plain_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || is_cjk(c)
}

/// Lowercase, collapse whitespace runs to a single space, trim.
///
/// ```
/// use market_linker::market_linking::normalize::normalize_text;
///
/// assert_eq!(normalize_text("  Bitcoin\n\tETF  "), "bitcoin etf");
/// ```
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// NFKC fold, turning full-width forms into their ASCII equivalents.
pub fn fold_width(s: &str) -> String {
    s.nfkc().collect()
}

/// Both projections of a normalized passage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// Normalized text with punctuation kept
    pub raw: String,
    /// Alphanumeric + CJK projection, single-space separated
    pub plain: String,
}

/// Normalize text for matching.
///
/// ```
/// use market_linker::market_linking::normalize::normalize_for_match;
///
/// let n = normalize_for_match("Buy $BTC now!!");
/// assert_eq!(n.raw, "buy $btc now!!");
/// assert_eq!(n.plain, "buy btc now");
/// ```
pub fn normalize_for_match(s: &str) -> NormalizedText {
    let raw = normalize_text(s);
    let plain = project_plain(&raw);
    NormalizedText { raw, plain }
}

/// Replace non-plain chars with spaces and collapse.
fn project_plain(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if is_plain_char(c) { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Neutralize social `@mentions`.
///
/// A handle whose lowercase form is in `keep` (it doubles as an entity term,
/// e.g. `@cz`) is left untouched; any other handle loses its `@` so it still
/// tokenizes as a plain word.
pub fn strip_mentions<'a>(s: &'a str, keep: &HashSet<String>) -> Cow<'a, str> {
    MENTION_RE.replace_all(s, |caps: &Captures<'_>| {
        let lead = &caps[1];
        let handle = &caps[2];
        if keep.contains(&handle.to_lowercase()) {
            format!("{}@{}", lead, handle)
        } else {
            format!("{} {}", lead, handle)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(terms: &[&str]) -> HashSet<String> {
        terms.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("  Apple   Inc  "), "apple inc");
        assert_eq!(normalize_text("A\u{3000}B"), "a b");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_plain_strips_punctuation() {
        let n = normalize_for_match("Will CZ return to #Binance?");
        assert_eq!(n.raw, "will cz return to #binance?");
        assert_eq!(n.plain, "will cz return to binance");
    }

    #[test]
    fn test_plain_keeps_cjk() {
        let n = normalize_for_match("日本银行，加息！BOJ");
        assert_eq!(n.plain, "日本银行 加息 boj");
    }

    #[test]
    fn test_plain_drops_accented_letters() {
        // Only ASCII alphanumerics and CJK ideographs survive
        assert_eq!(normalize_for_match("Société").plain, "soci t");
    }

    #[test]
    fn test_fold_width() {
        assert_eq!(fold_width("ＢＴＣ"), "BTC");
        assert_eq!(normalize_for_match(&fold_width("ＢＴＣ ＥＴＦ")).plain, "btc etf");
    }

    #[test]
    fn test_strip_mentions_keeps_entity_handles() {
        let out = strip_mentions("@CZ_BNB and @cz said", &keep(&["cz"]));
        assert_eq!(out, " CZ_BNB and @cz said");
    }

    #[test]
    fn test_strip_mentions_requires_leading_space() {
        let out = strip_mentions("mail me@example.com", &keep(&[]));
        assert_eq!(out, "mail me@example.com");
    }

    #[test]
    fn test_strip_mentions_rejects_long_handles() {
        let handle = "@abcdefghijklmnopqrstuvwxyz";
        assert_eq!(strip_mentions(handle, &keep(&[])), handle);
    }

    #[test]
    fn test_strip_mentions_borrows_when_unchanged() {
        let out = strip_mentions("no handles here", &keep(&[]));
        assert!(matches!(out, Cow::Borrowed(_)));
    }
}
