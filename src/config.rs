//! Matcher tunables
//!
//! Loads scoring constants from YAML and provides strongly-typed access.
//! Every field has a default, so a partial file only overrides what it names:
//!
//! ```yaml
//! default_entity_score: 0.5
//! low_signal_tokens: [binance, btc, eth, sol]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LinkingError, Result};

/// Scoring and display constants for the matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Tokens shared by many unrelated crypto markets; downweighted
    pub low_signal_tokens: HashSet<String>,
    /// Entity credit per group when the keyword carries a low-signal token
    pub low_signal_entity_score: f64,
    /// Multiplier applied to a positive keyword score carrying a low-signal token
    pub low_signal_score_multiplier: f64,
    /// Entity credit per newly satisfied group
    pub default_entity_score: f64,
    /// Share of a distinct keyword's score added to an already-matched target
    pub corroboration_factor: f64,
    /// Bonus for `$token` / `#token` in the raw text
    pub tag_bonus: f64,
    /// Longest CJK n-gram emitted by the tokenizer
    pub cjk_max_ngram: usize,
    /// Max char span between the tokens of a two-token keyword
    pub near_span_two_tokens: usize,
    /// Max char span between the tokens of a three-token keyword
    pub near_span_three_tokens: usize,
    /// Generic single words rejected when they are 6 chars or shorter
    pub generic_terms: HashSet<String>,
    /// Entity groups beyond this count are ignored (bitmask width)
    pub max_entity_groups: usize,
    /// Topics shown by `best_match`
    pub display_cap: usize,
    /// Results returned by `match_text` when the caller does not say
    pub default_top_n: usize,
    /// Score a result must reach for `matched: true`
    pub default_threshold: f64,
    /// NFKC-fold input before normalization (full-width → ASCII)
    pub unicode_fold: bool,
}

const LOW_SIGNAL_TOKENS: &[&str] = &["binance", "btc", "eth"];

const GENERIC_TERMS: &[&str] = &[
    "crypto", "web3", "trade", "market", "price", "defi", "token", "wallet", "chain", "coin",
    "yield", "stake", "swap", "pool", "mint", "airdrop",
];

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            low_signal_tokens: LOW_SIGNAL_TOKENS.iter().map(|s| s.to_string()).collect(),
            low_signal_entity_score: 0.18,
            low_signal_score_multiplier: 0.55,
            default_entity_score: 0.5,
            corroboration_factor: 0.12,
            tag_bonus: 0.05,
            cjk_max_ngram: 8,
            near_span_two_tokens: 50,
            near_span_three_tokens: 80,
            generic_terms: GENERIC_TERMS.iter().map(|s| s.to_string()).collect(),
            max_entity_groups: 20,
            display_cap: 3,
            default_top_n: 5,
            default_threshold: 0.6,
            unicode_fold: false,
        }
    }
}

impl MatcherConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| LinkingError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: MatcherConfig = serde_yaml::from_str(content)?;
        config.low_signal_tokens = lowercase_set(config.low_signal_tokens);
        config.generic_terms = lowercase_set(config.generic_terms);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scorer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let scores = [
            ("low_signal_entity_score", self.low_signal_entity_score),
            ("low_signal_score_multiplier", self.low_signal_score_multiplier),
            ("default_entity_score", self.default_entity_score),
            ("corroboration_factor", self.corroboration_factor),
            ("tag_bonus", self.tag_bonus),
        ];
        for (field, value) in scores {
            if !value.is_finite() || value < 0.0 {
                return Err(LinkingError::invalid(
                    field,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(LinkingError::invalid(
                "default_threshold",
                format!("must be within [0, 1], got {}", self.default_threshold),
            ));
        }
        if self.cjk_max_ngram == 0 {
            return Err(LinkingError::invalid("cjk_max_ngram", "must be at least 1"));
        }
        if self.near_span_two_tokens == 0 || self.near_span_three_tokens == 0 {
            return Err(LinkingError::invalid("near_span", "spans must be at least 1"));
        }
        if !(1..=32).contains(&self.max_entity_groups) {
            return Err(LinkingError::invalid(
                "max_entity_groups",
                format!("must be within 1..=32, got {}", self.max_entity_groups),
            ));
        }
        if self.display_cap == 0 {
            return Err(LinkingError::invalid("display_cap", "must be at least 1"));
        }
        if self.default_top_n == 0 {
            return Err(LinkingError::invalid("default_top_n", "must be at least 1"));
        }
        Ok(())
    }

    /// Whether a keyword token is too generic to drive ranking
    #[inline]
    pub fn is_low_signal(&self, token: &str) -> bool {
        self.low_signal_tokens.contains(token)
    }
}

fn lowercase_set(set: HashSet<String>) -> HashSet<String> {
    set.into_iter().map(|s| s.trim().to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatcherConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_low_signal("btc"));
        assert!(!config.is_low_signal("cz"));
        assert!(config.generic_terms.contains("airdrop"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = MatcherConfig::from_yaml("default_entity_score: 0.4\n").unwrap();
        assert_eq!(config.default_entity_score, 0.4);
        assert_eq!(config.cjk_max_ngram, 8);
        assert_eq!(config.corroboration_factor, 0.12);
    }

    #[test]
    fn test_yaml_sets_are_lowercased() {
        let yaml = "low_signal_tokens: [BTC, Sol]\n";
        let config = MatcherConfig::from_yaml(yaml).unwrap();
        assert!(config.is_low_signal("sol"));
        assert!(config.is_low_signal("btc"));
        assert!(!config.is_low_signal("eth"));
    }

    #[test]
    fn test_rejects_zero_ngram() {
        let err = MatcherConfig::from_yaml("cjk_max_ngram: 0\n").unwrap_err();
        assert!(matches!(
            err,
            LinkingError::InvalidConfig {
                field: "cjk_max_ngram",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_negative_score() {
        let err = MatcherConfig::from_yaml("tag_bonus: -0.1\n").unwrap_err();
        assert!(err.to_string().contains("tag_bonus"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        assert!(MatcherConfig::from_yaml("default_threshold: 1.5\n").is_err());
    }
}
