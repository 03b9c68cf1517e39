//! Match results and the `match_text` entry point
//!
//! `MatchResult` serializes to the JSON shape consumed by renderers:
//!
//! ```json
//! { "ok": true, "matched": false, "reason": "no_entity_match", "results": [] }
//! { "ok": true, "matched": true, "mode": "market", "threshold": 0.6,
//!   "candidates": 3, "results": [{ "score": 1.2, "keyword": "bitcoin etf", ... }] }
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::aggregate::{aggregate, Aggregation, MatchAccumulator};
use super::dataset::{Dataset, Market, TargetId, TargetKind};
use super::index::MatchIndex;
use crate::config::MatcherConfig;

/// Markets listed under an event result
const EVENT_MARKETS_SHOWN: usize = 5;

/// Why a passage produced no ranked targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    /// Nothing left after normalization
    EmptyText,
    /// No keyword shares a first token with the passage
    NoCandidates,
    /// No candidate target satisfied its entity groups
    NoEntityMatch,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyText => "empty_text",
            Self::NoCandidates => "no_candidates",
            Self::NoEntityMatch => "no_entity_match",
        }
    }
}

impl std::fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller knobs for `match_text`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// At least 1
    pub top_n: usize,
    /// Within `[0, 1]`
    pub threshold: f64,
}

impl MatchOptions {
    pub fn new(top_n: usize, threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            top_n: top_n.max(1),
            threshold,
        }
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.default_top_n, config.default_threshold)
    }
}

/// A market listed in a result, with every dataset field passed through
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub id: TargetId,
    #[serde(flatten)]
    pub market: Market,
}

/// One ranked target
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMatch {
    pub score: f64,
    pub keyword: String,
    pub reasons: Vec<String>,
    /// Sorted keywords that contributed score or entity credit
    pub matched_keywords: Vec<String>,
    pub mode: TargetKind,
    pub id: TargetId,
    pub title: String,
    pub primary_url: Option<String>,
    pub markets: Vec<MarketSummary>,
}

/// Ranked targets of a passage
#[derive(Debug, Clone)]
pub struct RankedMatch {
    /// Some result reached the threshold
    pub matched: bool,
    pub mode: TargetKind,
    pub threshold: f64,
    /// Keyword entries examined
    pub candidates: usize,
    /// Best first, at most `top_n`
    pub results: Vec<TargetMatch>,
}

/// Outcome of `match_text`; never an error
#[derive(Debug, Clone)]
pub enum MatchResult {
    NoMatch(NoMatchReason),
    Ranked(RankedMatch),
}

impl MatchResult {
    /// Some result reached the threshold
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Ranked(r) if r.matched)
    }

    pub fn reason(&self) -> Option<NoMatchReason> {
        match self {
            Self::NoMatch(reason) => Some(*reason),
            Self::Ranked(_) => None,
        }
    }

    pub fn results(&self) -> &[TargetMatch] {
        match self {
            Self::NoMatch(_) => &[],
            Self::Ranked(r) => &r.results,
        }
    }

    /// Highest-scoring result, whether or not it passed the threshold
    pub fn best(&self) -> Option<&TargetMatch> {
        self.results().first()
    }
}

impl Serialize for MatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::NoMatch(reason) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("matched", &false)?;
                map.serialize_entry("reason", reason)?;
                map.serialize_entry("results", &[] as &[TargetMatch])?;
                map.end()
            }
            Self::Ranked(r) => {
                let mut map = serializer.serialize_map(Some(6))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("matched", &r.matched)?;
                map.serialize_entry("mode", &r.mode)?;
                map.serialize_entry("threshold", &r.threshold)?;
                map.serialize_entry("candidates", &r.candidates)?;
                map.serialize_entry("results", &r.results)?;
                map.end()
            }
        }
    }
}

/// Match a passage against the index and render the top targets.
pub fn match_text(dataset: &Dataset, index: &MatchIndex, text: &str, options: &MatchOptions) -> MatchResult {
    let ranked = match aggregate(dataset, index, text) {
        Aggregation::NoMatch(reason) => {
            tracing::debug!(%reason, "No match");
            return MatchResult::NoMatch(reason);
        }
        Aggregation::Ranked(ranked) => ranked,
    };

    let results: Vec<TargetMatch> = ranked
        .targets
        .iter()
        .take(options.top_n)
        .filter_map(|acc| render(dataset, acc))
        .collect();
    let matched = results.iter().any(|r| r.score >= options.threshold);

    tracing::debug!(
        matched,
        results = results.len(),
        best = results.first().map(|r| r.score).unwrap_or(0.0),
        "Matched passage"
    );

    MatchResult::Ranked(RankedMatch {
        matched,
        mode: index.mode(),
        threshold: options.threshold,
        candidates: ranked.candidates,
        results,
    })
}

fn render(dataset: &Dataset, acc: &MatchAccumulator) -> Option<TargetMatch> {
    let id = &acc.target.id;
    let (title, primary_url, markets) = match acc.target.kind {
        TargetKind::Event => {
            let event = dataset.event(id)?;
            let markets: Vec<MarketSummary> = event
                .market_ids
                .iter()
                .take(EVENT_MARKETS_SHOWN)
                .filter_map(|mid| {
                    dataset
                        .market(mid)
                        .filter(|m| !m.title.is_empty())
                        .map(|m| MarketSummary {
                            id: mid.clone(),
                            market: m.clone(),
                        })
                })
                .collect();
            let primary_url = event
                .best_market_id
                .as_ref()
                .or_else(|| event.market_ids.first())
                .and_then(|mid| dataset.market(mid))
                .and_then(|m| m.url.clone());
            (event.title.clone(), primary_url, markets)
        }
        TargetKind::Market => {
            let market = dataset.market(id)?;
            let summary = MarketSummary {
                id: id.clone(),
                market: market.clone(),
            };
            (market.title.clone(), market.url.clone(), vec![summary])
        }
    };

    Some(TargetMatch {
        score: acc.score,
        keyword: acc.keyword.clone(),
        reasons: acc.reasons.clone(),
        matched_keywords: acc.matched_signals.iter().cloned().collect(),
        mode: acc.target.kind,
        id: id.clone(),
        title,
        primary_url,
        markets,
    })
}
