//! Keyword entry scoring
//!
//! Scores a single keyword entry against a tokenized passage. Branches are
//! tried in priority order and the first applicable one wins:
//!
//! 1. exact phrase containment in `plain`
//! 2. multi-token keyword, token-set overlap (with a proximity check)
//! 3. single-token keyword, token-set membership
//!
//! The `$tag`/`#tag` bonus and low-signal dampening then apply on top, and
//! the result is clamped to `[0, 1]`.

use smallvec::SmallVec;

use super::index::KeywordEntry;
use super::tokenize::{tokens_near, TokenizedText};
use crate::config::MatcherConfig;

const PHRASE_BASE: f64 = 0.85;
const PHRASE_LENGTH_BONUS_CAP: f64 = 0.10;
const PHRASE_LENGTH_DIVISOR: f64 = 120.0;
const SINGLE_PHRASE_PER_CHAR: f64 = 0.1;
const SINGLE_PHRASE_CAP: f64 = 0.65;
const ALL_TOKENS_NEAR: f64 = 0.7;
const ALL_TOKENS_FAR: f64 = 0.45;
const PARTIAL_TOKENS_BASE: f64 = 0.35;
const PARTIAL_TOKENS_STEP: f64 = 0.05;
const SINGLE_TOKEN_PER_CHAR: f64 = 0.09;
const SHORT_TOKEN_CAP: f64 = 0.48;
const LONG_TOKEN_CAP: f64 = 0.70;
/// Tokens up to this length use the short cap and can be generic stop-terms
const SHORT_TOKEN_CHARS: usize = 6;
const MIN_TAG_CHARS: usize = 3;

/// Why a keyword entry scored what it did
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreReason {
    /// Keyword found verbatim in the text
    Phrase(String),
    /// Single word found but too generic to count
    Rejected(String),
    /// Every keyword token present
    AllTokens,
    /// ...and close together
    Near,
    /// Some keyword tokens present
    PartialTokens { present: usize, total: usize },
    /// Single-token keyword present
    Single(String),
    /// `$token` or `#token` in the raw text
    Tag(String),
    /// Dampened for carrying a low-signal token
    LowSignal,
}

impl std::fmt::Display for ScoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phrase(p) => write!(f, "phrase:{}", p),
            Self::Rejected(w) => write!(f, "rejected:{}", w),
            Self::AllTokens => f.write_str("tokens:all"),
            Self::Near => f.write_str("near"),
            Self::PartialTokens { present, total } => write!(f, "tokens:{}/{}", present, total),
            Self::Single(t) => write!(f, "single:{}", t),
            Self::Tag(t) => write!(f, "tag:{}", t),
            Self::LowSignal => f.write_str("low_signal"),
        }
    }
}

/// Score of one keyword entry against one passage
#[derive(Debug, Clone, PartialEq)]
pub struct EntryScore {
    /// Clamped to `[0, 1]`
    pub score: f64,
    pub reasons: SmallVec<[ScoreReason; 4]>,
}

impl EntryScore {
    pub fn is_positive(&self) -> bool {
        self.score > 0.0
    }
}

/// Single words that are years, too short, or generic never count
pub fn is_rejected_word(word: &str, config: &MatcherConfig) -> bool {
    let len = word.chars().count();
    let is_year = len == 4 && word.chars().all(|c| c.is_ascii_digit());
    let is_short = len <= 3;
    let is_generic = len <= SHORT_TOKEN_CHARS && config.generic_terms.contains(word);
    is_year || is_short || is_generic
}

/// Score a keyword entry against a tokenized passage.
pub fn score_entry(text: &TokenizedText, entry: &KeywordEntry, config: &MatcherConfig) -> EntryScore {
    let mut reasons: SmallVec<[ScoreReason; 4]> = SmallVec::new();
    let mut score = 0.0_f64;

    let keyword_plain = entry.keyword_plain.as_str();
    let tokens = &entry.keyword_tokens;

    if !keyword_plain.is_empty() && text.plain.contains(keyword_plain) {
        let len = keyword_plain.chars().count();
        if keyword_plain.contains(' ') {
            score += PHRASE_BASE + PHRASE_LENGTH_BONUS_CAP.min(len as f64 / PHRASE_LENGTH_DIVISOR);
            reasons.push(ScoreReason::Phrase(keyword_plain.to_string()));
        } else if is_rejected_word(keyword_plain, config) {
            reasons.push(ScoreReason::Rejected(keyword_plain.to_string()));
        } else {
            score += SINGLE_PHRASE_CAP.min(len as f64 * SINGLE_PHRASE_PER_CHAR);
            reasons.push(ScoreReason::Phrase(keyword_plain.to_string()));
        }
    } else if tokens.len() >= 2 {
        let present = tokens.iter().filter(|t| text.tokens.contains(t)).count();
        if present == tokens.len() {
            let near = tokens_near(
                &text.plain,
                tokens,
                config.near_span_two_tokens,
                config.near_span_three_tokens,
            );
            score += if near { ALL_TOKENS_NEAR } else { ALL_TOKENS_FAR };
            reasons.push(ScoreReason::AllTokens);
            if near {
                reasons.push(ScoreReason::Near);
            }
        } else if present >= 2 {
            score += PARTIAL_TOKENS_BASE + (present - 2) as f64 * PARTIAL_TOKENS_STEP;
            reasons.push(ScoreReason::PartialTokens {
                present,
                total: tokens.len(),
            });
        }
    } else if let [token] = tokens.as_slice() {
        if text.tokens.contains(token) {
            let len = token.chars().count();
            if is_rejected_word(token, config) {
                reasons.push(ScoreReason::Rejected(token.clone()));
            } else {
                let cap = if len <= SHORT_TOKEN_CHARS {
                    SHORT_TOKEN_CAP
                } else {
                    LONG_TOKEN_CAP
                };
                score += cap.min(len as f64 * SINGLE_TOKEN_PER_CHAR);
                reasons.push(ScoreReason::Single(token.clone()));
            }
        }
    }

    let tagged = tokens.iter().find(|t| {
        t.chars().count() >= MIN_TAG_CHARS
            && (text.raw.contains(&format!("${}", t)) || text.raw.contains(&format!("#{}", t)))
    });
    if let Some(t) = tagged {
        score += config.tag_bonus;
        reasons.push(ScoreReason::Tag(t.clone()));
    }

    if entry.low_signal && score > 0.0 {
        score *= config.low_signal_score_multiplier;
        reasons.push(ScoreReason::LowSignal);
    }

    EntryScore {
        score: score.clamp(0.0, 1.0),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_linking::dataset::TargetKind;
    use crate::market_linking::tokenize::{tokenize, TokenSet};

    fn entry(keyword: &str) -> KeywordEntry {
        KeywordEntry::new(keyword, TargetKind::Market, vec!["m1".into()], &MatcherConfig::default())
    }

    fn score(text: &str, keyword: &str) -> EntryScore {
        let config = MatcherConfig::default();
        score_entry(&tokenize(text, config.cjk_max_ngram), &entry(keyword), &config)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_multi_word_phrase() {
        let s = score("Bitcoin ETF approved", "bitcoin etf");
        assert!(close(s.score, 0.85 + 11.0 / 120.0));
        assert_eq!(s.reasons[0], ScoreReason::Phrase("bitcoin etf".into()));
    }

    #[test]
    fn test_long_phrase_bonus_is_capped() {
        let keyword = "federal reserve interest rate decision january";
        let s = score(&format!("the {} is out", keyword), keyword);
        assert!(close(s.score, 0.95));
    }

    #[test]
    fn test_single_word_phrase() {
        let s = score("tesla stock rallies", "tesla");
        assert!(close(s.score, 0.5));
        let s = score("ethereum merges", "ethereum");
        assert!(close(s.score, 0.65));
    }

    #[test]
    fn test_single_word_phrase_substring_counts() {
        // Phrase containment is a raw substring check on `plain`
        let s = score("teslas everywhere", "tesla");
        assert!(close(s.score, 0.5));
    }

    #[test]
    fn test_rejections() {
        for (text, keyword) in [
            ("happening in 2025", "2025"),
            ("the fed again", "fed"),
            ("new token soon", "token"),
            ("best crypto ever", "crypto"),
        ] {
            let s = score(text, keyword);
            assert_eq!(s.score, 0.0, "{} should be rejected", keyword);
            assert!(matches!(s.reasons[0], ScoreReason::Rejected(_)));
        }
    }

    #[test]
    fn test_generic_term_longer_than_six_is_not_rejected() {
        let config = MatcherConfig {
            generic_terms: ["stablecoin".to_string()].into_iter().collect(),
            ..MatcherConfig::default()
        };
        assert!(!is_rejected_word("stablecoin", &config));
    }

    #[test]
    fn test_all_tokens_near() {
        let s = score("trump wins the election", "trump election");
        assert!(close(s.score, 0.7));
        assert_eq!(
            s.reasons.as_slice(),
            &[ScoreReason::AllTokens, ScoreReason::Near]
        );
    }

    #[test]
    fn test_all_tokens_far() {
        let text = format!("election {} trump", "word ".repeat(15));
        let s = score(&text, "trump election");
        assert!(close(s.score, 0.45));
    }

    #[test]
    fn test_partial_tokens() {
        let s = score("fed cuts rates today", "fed rate cuts january");
        // "fed" and "cuts" present, 2/4
        assert!(close(s.score, 0.35));
        assert_eq!(
            s.reasons[0],
            ScoreReason::PartialTokens {
                present: 2,
                total: 4
            }
        );
    }

    #[test]
    fn test_partial_tokens_step() {
        let s = score("january fed cuts", "fed rate cuts january");
        assert!(close(s.score, 0.40));
        assert_eq!(
            s.reasons[0],
            ScoreReason::PartialTokens {
                present: 3,
                total: 4
            }
        );
    }

    #[test]
    fn test_three_tokens_near_and_far() {
        // "january" starts at char n + 10
        let near = score(&format!("fed {} cuts january", "x".repeat(70)), "fed cuts january");
        assert!(near.reasons.contains(&ScoreReason::Near));

        let far = score(&format!("fed {} cuts january", "x".repeat(71)), "fed cuts january");
        assert!(far.reasons.contains(&ScoreReason::AllTokens));
        assert!(!far.reasons.contains(&ScoreReason::Near));
        assert!(far.score < near.score);
    }

    #[test]
    fn test_one_of_two_tokens_scores_nothing() {
        let s = score("trump speaks", "trump election");
        assert_eq!(s.score, 0.0);
        assert!(s.reasons.is_empty());
    }

    #[test]
    fn test_airdrop_is_too_long_to_reject() {
        let s = score("new airdrop soon", "airdrop");
        assert!(close(s.score, 0.65));
    }

    #[test]
    fn test_single_token_branch() {
        // Token-set membership without a phrase hit
        let config = MatcherConfig::default();
        let mut tokens = TokenSet::new();
        tokens.insert("bitcoin");
        tokens.insert("solana");
        let text = TokenizedText {
            raw: String::new(),
            plain: String::new(),
            tokens,
        };
        let long = score_entry(&text, &entry("bitcoin"), &config);
        assert!(close(long.score, 0.63));
        assert_eq!(long.reasons[0], ScoreReason::Single("bitcoin".into()));
        let short = score_entry(&text, &entry("solana"), &config);
        assert!(close(short.score, 0.48));
    }

    #[test]
    fn test_cjk_keyword_phrase() {
        let config = MatcherConfig::default();
        let text = tokenize("日本银行加息", config.cjk_max_ngram);
        let s = score_entry(&text, &entry("日本银行"), &config);
        // Phrase branch: 4 chars × 0.1
        assert!(close(s.score, 0.4));
    }

    #[test]
    fn test_tag_bonus_once() {
        let s = score("$solana and #solana pumping", "solana");
        assert!(close(s.score, 0.6 + 0.05));
        assert_eq!(
            s.reasons.iter().filter(|r| matches!(r, ScoreReason::Tag(_))).count(),
            1
        );
    }

    #[test]
    fn test_tag_bonus_applies_without_branch_hit() {
        let s = score("$sol", "sol");
        // "sol" is rejected as short but the tag still counts
        assert!(close(s.score, 0.05));
    }

    #[test]
    fn test_low_signal_dampening() {
        let s = score("eth etf approved", "eth etf");
        assert!(close(s.score, (0.85 + 7.0 / 120.0) * 0.55));
        assert_eq!(s.reasons.last(), Some(&ScoreReason::LowSignal));
    }

    #[test]
    fn test_low_signal_not_applied_to_zero() {
        let s = score("nothing here", "btc halving");
        assert_eq!(s.score, 0.0);
        assert!(!s.reasons.contains(&ScoreReason::LowSignal));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ScoreReason::Phrase("a b".into()).to_string(), "phrase:a b");
        assert_eq!(
            ScoreReason::PartialTokens {
                present: 2,
                total: 3
            }
            .to_string(),
            "tokens:2/3"
        );
        assert_eq!(ScoreReason::LowSignal.to_string(), "low_signal");
    }
}
