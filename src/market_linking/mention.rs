//! Mention detection and entity-group tracking
//!
//! A keyword "mentions" its entity only under a stricter, positional notion
//! of presence than raw token membership. Mentions are used only to satisfy
//! entity groups, never for the numeric keyword score.

use std::collections::HashMap;

use super::index::{EntityRequirement, KeywordEntry, TargetKey};
use super::normalize::is_cjk;
use super::tokenize::{tokens_near, TokenizedText};
use crate::config::MatcherConfig;

/// Whether a keyword entry is confidently mentioned in the passage.
///
/// - single token: the token is in the token set; a CJK keyword longer than
///   the n-gram cap also counts when it is a literal substring of `plain`
/// - multiple tokens: the full phrase is a substring of `plain`, or every
///   token is present and they sit within the near span
pub fn is_entry_mentioned(text: &TokenizedText, entry: &KeywordEntry, config: &MatcherConfig) -> bool {
    let tokens: Vec<&String> = entry.keyword_tokens.iter().filter(|t| !t.is_empty()).collect();
    let keyword_plain = entry.keyword_plain.as_str();

    match tokens.as_slice() {
        [] => false,
        [token] => {
            text.tokens.contains(token)
                || (!keyword_plain.is_empty()
                    && token.chars().any(is_cjk)
                    && text.plain.contains(keyword_plain))
        }
        _ => {
            if !keyword_plain.is_empty() && text.plain.contains(keyword_plain) {
                return true;
            }
            tokens.iter().all(|t| text.tokens.contains(t))
                && tokens_near(
                    &text.plain,
                    &entry.keyword_tokens,
                    config.near_span_two_tokens,
                    config.near_span_three_tokens,
                )
        }
    }
}

/// Satisfied entity-group bits per target for one match call.
///
/// Bits only ever get set; a group credited once is never credited again.
#[derive(Debug, Default)]
pub struct SatisfiedGroups {
    masks: HashMap<TargetKey, u32>,
}

impl SatisfiedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mention of `keyword` for `target`.
    ///
    /// Returns the number of groups newly satisfied by this mention.
    pub fn credit(&mut self, target: &TargetKey, requirement: &EntityRequirement, keyword: &str) -> u32 {
        let term_mask = requirement.mask_for(keyword);
        if term_mask == 0 {
            return 0;
        }
        let prev = self.mask(target);
        let new_bits = term_mask & !prev;
        if new_bits == 0 {
            return 0;
        }
        self.masks.insert(target.clone(), prev | new_bits);
        new_bits.count_ones()
    }

    /// Current satisfied bits (0 when never credited)
    pub fn mask(&self, target: &TargetKey) -> u32 {
        self.masks.get(target).copied().unwrap_or(0)
    }

    /// Whether `target` covers every required group
    pub fn satisfies(&self, target: &TargetKey, requirement: &EntityRequirement) -> bool {
        requirement.is_satisfied_by(self.mask(target))
    }
}
