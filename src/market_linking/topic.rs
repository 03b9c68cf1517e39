//! Topic-level best match for inline display
//!
//! Several options of one multi-option event often match the same passage.
//! For display they collapse into one topic: the event. `best_match` walks
//! the ranked targets and keeps the first target per topic, up to
//! `MatcherConfig::display_cap` topics.

use std::collections::HashSet;

use serde::Serialize;

use super::aggregate::{aggregate, Aggregation, MatchAccumulator};
use super::dataset::{Dataset, OutcomeLabels, TargetId, TargetKind};
use super::index::MatchIndex;

/// One deduplicated topic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMatch {
    /// Event id for multi-option topics, else the market id
    pub topic_id: TargetId,
    pub title: String,
    pub labels: Option<OutcomeLabels>,
    /// Options of a multi-option topic
    pub market_ids: Option<Vec<TargetId>>,
    pub best_market_id: Option<TargetId>,
    pub is_multi: bool,
    pub url: Option<String>,
    pub matched_keywords: Vec<String>,
}

/// Best match of a passage, deduplicated by topic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestMatch {
    /// `event` when the primary topic is multi-option
    pub mode: TargetKind,
    /// Representative keyword of the best target
    pub keyword: String,
    pub matched_keywords: Vec<String>,
    pub topic_id: TargetId,
    pub title: String,
    pub primary_url: Option<String>,
    /// At most `display_cap`, best first
    pub topics: Vec<TopicMatch>,
}

/// Best topic-deduplicated match, or `None` when nothing passes the entity gate.
pub fn best_match(dataset: &Dataset, index: &MatchIndex, text: &str) -> Option<BestMatch> {
    let ranked = match aggregate(dataset, index, text) {
        Aggregation::NoMatch(_) => return None,
        Aggregation::Ranked(ranked) => ranked,
    };
    let best = ranked.targets.first()?;
    let display_cap = index.config().display_cap;

    let mut seen: HashSet<TargetId> = HashSet::new();
    let mut topics: Vec<TopicMatch> = Vec::new();
    let mut primary: Option<usize> = None;

    for acc in &ranked.targets {
        let Some(topic) = topic_for(dataset, acc) else {
            continue;
        };
        if !seen.insert(topic.topic_id.clone()) {
            continue;
        }
        if primary.is_none() && acc.target == best.target {
            primary = Some(topics.len());
        }
        topics.push(topic);
        if topics.len() >= display_cap {
            break;
        }
    }

    let primary_topic = topics.get(primary.unwrap_or(0))?;
    let mode = if primary_topic.is_multi {
        TargetKind::Event
    } else {
        TargetKind::Market
    };

    tracing::debug!(
        topics = topics.len(),
        primary = %primary_topic.topic_id,
        "Best match"
    );

    Some(BestMatch {
        mode,
        keyword: best.keyword.clone(),
        matched_keywords: best.matched_signals.iter().cloned().collect(),
        topic_id: primary_topic.topic_id.clone(),
        title: primary_topic.title.clone(),
        primary_url: primary_topic.url.clone(),
        topics,
    })
}

fn topic_for(dataset: &Dataset, acc: &MatchAccumulator) -> Option<TopicMatch> {
    let id = &acc.target.id;
    let matched_keywords: Vec<String> = acc.matched_signals.iter().cloned().collect();

    match acc.target.kind {
        TargetKind::Event => {
            let event = dataset.event(id)?;
            let best_market_id = event
                .best_market_id
                .clone()
                .or_else(|| event.market_ids.first().cloned());
            let best_market = best_market_id.as_deref().and_then(|mid| dataset.market(mid));
            Some(TopicMatch {
                topic_id: id.clone(),
                title: non_empty(&event.title).unwrap_or("Event").to_string(),
                labels: best_market.and_then(|m| m.labels.clone()),
                market_ids: Some(event.market_ids.clone()),
                best_market_id,
                is_multi: true,
                url: best_market.and_then(|m| m.url.clone()),
                matched_keywords,
            })
        }
        TargetKind::Market => {
            let market = dataset.market(id)?;
            if !market.is_multi_option(id) {
                return Some(TopicMatch {
                    topic_id: id.clone(),
                    title: non_empty(&market.title).unwrap_or("Market").to_string(),
                    labels: market.labels.clone(),
                    market_ids: None,
                    best_market_id: None,
                    is_multi: false,
                    url: market.url.clone(),
                    matched_keywords,
                });
            }

            let topic_id = market.event_id.clone().unwrap_or_else(|| id.clone());
            let event = dataset.event(&topic_id);
            let title = event
                .and_then(|e| non_empty(&e.title))
                .or_else(|| market.event_title.as_deref().and_then(non_empty))
                .or_else(|| non_empty(&market.title))
                .unwrap_or("Event")
                .to_string();
            let best_market_id = event.and_then(|e| e.best_market_id.clone());
            let url = best_market_id
                .as_deref()
                .and_then(|mid| dataset.market(mid))
                .and_then(|m| m.url.clone())
                .or_else(|| market.url.clone());
            Some(TopicMatch {
                topic_id,
                title,
                labels: market.labels.clone(),
                market_ids: event.map(|e| e.market_ids.clone()),
                best_market_id,
                is_multi: true,
                url,
                matched_keywords,
            })
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
