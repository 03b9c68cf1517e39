//! Per-target aggregation and ranking
//!
//! One pass over the candidate keyword entries of a passage:
//!
//! ```text
//! text ─► strip @mentions ─► tokenize ─► first-token candidates
//!                                              │
//!             ┌────────────────────────────────┤ for each entry
//!             ▼                                ▼
//!        score_entry                   is_entry_mentioned
//!             │                                │ credit new entity groups
//!             └──────────► accumulator per target ◄┘
//!                                  │
//!                 entity-gate filter ─► sort by score
//! ```
//!
//! All state lives in locals of [`aggregate`]; the index is only read.

use std::collections::{BTreeSet, HashMap};

use super::dataset::Dataset;
use super::index::{KeywordEntry, MatchIndex, TargetKey};
use super::mention::{is_entry_mentioned, SatisfiedGroups};
use super::normalize::{fold_width, strip_mentions};
use super::result::NoMatchReason;
use super::scorer::{score_entry, EntryScore};
use super::tokenize::tokenize;

/// Running evidence for one target during a match call
#[derive(Debug, Clone)]
pub struct MatchAccumulator {
    pub target: TargetKey,
    /// Accumulated score; not clamped, corroboration can push it past 1
    pub score: f64,
    /// Representative keyword label (from the best single contribution)
    pub keyword: String,
    /// Best single-keyword score seen
    pub base_score: f64,
    /// Ordered trace of scoring decisions
    pub reasons: Vec<String>,
    /// Every keyword seen for this target
    pub matched_keywords: BTreeSet<String>,
    /// Keywords that contributed score or entity credit
    pub matched_signals: BTreeSet<String>,
    pub match_count: usize,
}

/// One keyword entry's contribution to one target
struct Contribution<'a> {
    entry: &'a KeywordEntry,
    scored: &'a EntryScore,
    /// Entity groups newly satisfied by this contribution
    groups_added: u32,
    entity_score: f64,
}

impl Contribution<'_> {
    fn entity_add(&self) -> f64 {
        self.entity_score * self.groups_added as f64
    }

    fn entity_reason(&self, prefix: &str) -> String {
        let tag = if self.entry.low_signal {
            "entity_low"
        } else {
            "entity"
        };
        format!("{}{}:{}", prefix, tag, self.entry.keyword)
    }

    fn contributed(&self) -> bool {
        self.scored.is_positive() || self.groups_added > 0
    }
}

impl MatchAccumulator {
    fn open(target: TargetKey, c: &Contribution<'_>) -> Self {
        let mut reasons: Vec<String> = c.scored.reasons.iter().map(|r| r.to_string()).collect();
        if c.groups_added > 0 {
            reasons.push(c.entity_reason(""));
        }
        let entity_floor = if c.groups_added > 0 { c.entity_score } else { 0.0 };

        let mut matched_signals = BTreeSet::new();
        if c.contributed() {
            matched_signals.insert(c.entry.keyword.clone());
        }

        Self {
            target,
            score: c.scored.score + c.entity_add(),
            keyword: c.entry.label().to_string(),
            base_score: c.scored.score.max(entity_floor),
            reasons,
            matched_keywords: BTreeSet::from([c.entry.keyword.clone()]),
            matched_signals,
            match_count: 1,
        }
    }

    fn absorb(&mut self, c: &Contribution<'_>, corroboration_factor: f64) {
        if c.groups_added > 0 {
            self.score += c.entity_add();
            self.reasons.push(c.entity_reason("+"));
            if c.entity_score > self.base_score {
                self.base_score = c.entity_score;
                self.keyword = c.entry.label().to_string();
            }
        }

        // A keyword already counted for this target earns nothing more
        if self.matched_keywords.contains(&c.entry.keyword) {
            return;
        }
        if c.scored.is_positive() {
            self.score += c.scored.score * corroboration_factor;
            self.reasons
                .extend(c.scored.reasons.iter().map(|r| format!("+{}", r)));
        }
        self.match_count += 1;
        self.matched_keywords.insert(c.entry.keyword.clone());
        if c.contributed() {
            self.matched_signals.insert(c.entry.keyword.clone());
        }
        if c.scored.score > self.base_score {
            self.base_score = c.scored.score;
            self.keyword = c.entry.label().to_string();
        }
    }
}

/// Entity-satisfied targets of one passage, best first
#[derive(Debug, Clone)]
pub struct RankedTargets {
    /// Keyword entries examined
    pub candidates: usize,
    /// Never empty
    pub targets: Vec<MatchAccumulator>,
}

/// Outcome of aggregation
#[derive(Debug, Clone)]
pub enum Aggregation {
    NoMatch(NoMatchReason),
    Ranked(RankedTargets),
}

/// Score, gate and rank every target the passage could refer to.
///
/// Targets referenced by the index but absent from `dataset` are dropped.
pub fn aggregate(dataset: &Dataset, index: &MatchIndex, text: &str) -> Aggregation {
    let config = index.config();

    let folded;
    let text = if config.unicode_fold {
        folded = fold_width(text);
        folded.as_str()
    } else {
        text
    };
    let cleaned = strip_mentions(text, index.mention_keep_set());
    let tokenized = tokenize(&cleaned, config.cjk_max_ngram);
    if tokenized.plain.is_empty() {
        return Aggregation::NoMatch(NoMatchReason::EmptyText);
    }

    let candidates: Vec<&KeywordEntry> = tokenized
        .tokens
        .iter()
        .flat_map(|token| index.candidates_for(token))
        .collect();

    let mut accumulators: Vec<MatchAccumulator> = Vec::new();
    let mut positions: HashMap<TargetKey, usize> = HashMap::new();
    let mut satisfied = SatisfiedGroups::new();

    for entry in &candidates {
        let scored = score_entry(&tokenized, entry, config);
        let mentioned = is_entry_mentioned(&tokenized, entry, config);
        let entity_score = if entry.low_signal {
            config.low_signal_entity_score
        } else {
            config.default_entity_score
        };

        for target in entry.targets() {
            let groups_added = match (mentioned, index.requirement(&target)) {
                (true, Some(requirement)) => satisfied.credit(&target, requirement, &entry.keyword),
                _ => 0,
            };
            let contribution = Contribution {
                entry,
                scored: &scored,
                groups_added,
                entity_score,
            };

            match positions.get(&target) {
                Some(&pos) => accumulators[pos].absorb(&contribution, config.corroboration_factor),
                None => {
                    positions.insert(target.clone(), accumulators.len());
                    accumulators.push(MatchAccumulator::open(target, &contribution));
                }
            }
        }
    }

    if accumulators.is_empty() {
        return Aggregation::NoMatch(NoMatchReason::NoCandidates);
    }

    let examined = accumulators.len();
    let mut targets: Vec<MatchAccumulator> = accumulators
        .into_iter()
        .filter(|acc| {
            index
                .requirement(&acc.target)
                .is_some_and(|req| satisfied.satisfies(&acc.target, req))
                && dataset.contains(acc.target.kind, &acc.target.id)
        })
        .collect();

    tracing::debug!(
        candidates = candidates.len(),
        examined,
        satisfied = targets.len(),
        "Aggregated passage"
    );

    if targets.is_empty() {
        return Aggregation::NoMatch(NoMatchReason::NoEntityMatch);
    }

    // Stable: equal scores keep first-seen order
    targets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Aggregation::Ranked(RankedTargets {
        candidates: candidates.len(),
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn build(value: serde_json::Value) -> (Dataset, MatchIndex) {
        let dataset: Dataset = serde_json::from_value(value).unwrap();
        let index = MatchIndex::build(&dataset, &MatcherConfig::default());
        (dataset, index)
    }

    fn ranked(dataset: &Dataset, index: &MatchIndex, text: &str) -> RankedTargets {
        match aggregate(dataset, index, text) {
            Aggregation::Ranked(r) => r,
            Aggregation::NoMatch(reason) => panic!("expected ranking, got {:?}", reason),
        }
    }

    #[test]
    fn test_empty_text() {
        let (data, index) = build(json!({}));
        assert!(matches!(
            aggregate(&data, &index, "  !!  "),
            Aggregation::NoMatch(NoMatchReason::EmptyText)
        ));
    }

    #[test]
    fn test_no_candidates() {
        let (data, index) = build(json!({ "index": { "tesla": ["m1"] } }));
        assert!(matches!(
            aggregate(&data, &index, "nothing relevant"),
            Aggregation::NoMatch(NoMatchReason::NoCandidates)
        ));
    }

    #[test]
    fn test_entity_bonus_and_corroboration() {
        let (data, index) = build(json!({
            "index": { "bitcoin etf": ["m1"], "bitcoin": ["m1"], "approval": ["m1"] },
            "markets": { "m1": { "title": "ETF?", "entityGroups": [["bitcoin"]] } }
        }));
        let r = ranked(&data, &index, "Bitcoin ETF approval");
        let acc = &r.targets[0];

        // Candidates in text order: "bitcoin" (first token of two keywords), then "approval"
        let bitcoin = 0.65;
        let phrase = 0.85 + 11.0 / 120.0;
        let approval = 0.65;
        let expected = bitcoin + 0.5 + (phrase + approval) * 0.12;
        assert!(close(acc.score, expected), "score {}", acc.score);
        assert_eq!(acc.keyword, "bitcoin etf");
        assert_eq!(acc.match_count, 3);
        assert!(acc.reasons.contains(&"entity:bitcoin".to_string()));
        assert!(acc.reasons.contains(&"+phrase:bitcoin etf".to_string()));
    }

    #[test]
    fn test_unsatisfied_group_is_filtered() {
        let (data, index) = build(json!({
            "index": { "trump": ["m1"] },
            "markets": { "m1": { "title": "T", "entityGroups": [["trump"], ["election"]] } }
        }));
        assert!(matches!(
            aggregate(&data, &index, "trump speaks"),
            Aggregation::NoMatch(NoMatchReason::NoEntityMatch)
        ));
    }

    #[test]
    fn test_unknown_target_is_dropped() {
        let (data, index) = build(json!({
            "index": { "tesla": ["ghost"] },
            "markets": {}
        }));
        assert!(matches!(
            aggregate(&data, &index, "tesla"),
            Aggregation::NoMatch(NoMatchReason::NoEntityMatch)
        ));
    }

    #[test]
    fn test_low_signal_entity_score() {
        let (data, index) = build(json!({
            "index": { "binance": ["m1"] },
            "markets": { "m1": { "title": "B", "entityGroups": [["binance"]] } }
        }));
        let r = ranked(&data, &index, "binance listing");
        let acc = &r.targets[0];
        assert!(close(acc.score, 0.65 * 0.55 + 0.18));
        assert!(acc.reasons.contains(&"entity_low:binance".to_string()));
    }

    #[test]
    fn test_entity_only_keyword_sets_representative() {
        let (data, index) = build(json!({
            "index": { "cz": ["m1"] },
            "markets": { "m1": { "title": "CZ", "entityGroups": [["cz"]] } }
        }));
        let r = ranked(&data, &index, "cz tweeted");
        let acc = &r.targets[0];
        // "cz" is rejected as a short word but still satisfies the group
        assert!(close(acc.score, 0.5));
        assert!(close(acc.base_score, 0.5));
        assert_eq!(acc.matched_signals.iter().collect::<Vec<_>>(), vec!["cz"]);
    }

    #[test]
    fn test_ranking_is_descending() {
        let (data, index) = build(json!({
            "index": { "tesla": ["m1", "m2"], "tesla robotaxi": ["m2"] },
            "markets": {
                "m1": { "title": "Tesla stock", "entityGroups": [["tesla"]] },
                "m2": { "title": "Tesla robotaxi", "entityGroups": [["tesla"]] }
            }
        }));
        let r = ranked(&data, &index, "tesla robotaxi launch");
        let ids: Vec<&str> = r.targets.iter().map(|t| t.target.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1"]);
        assert_eq!(r.candidates, 2);
    }
}
