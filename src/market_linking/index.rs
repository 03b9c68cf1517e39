//! Compiled match index
//!
//! `MatchIndex` is built once per dataset load and is immutable afterwards.
//! It provides:
//! - first-token → keyword entries (the only candidate pruning structure;
//!   a match call never scans the full keyword universe)
//! - per-target required entity-group bitmask
//! - per-target term → group-bits map
//! - the set of handles that `strip_mentions` must keep
//!
//! Dataset refresh produces a new index value; see
//! [`super::service::MarketLinkingServiceImpl::reload`].

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use smallvec::SmallVec;

use super::dataset::{Dataset, EntityGated, KeywordIndex, TargetId, TargetKind};
use super::normalize::normalize_for_match;
use crate::config::MatcherConfig;

/// Shortest keyword kept in the index (chars)
const MIN_KEYWORD_CHARS: usize = 2;

/// Market or event, scoped by universe so ids never collide across the two
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub kind: TargetKind,
    pub id: TargetId,
}

impl TargetKey {
    pub fn new(kind: TargetKind, id: impl Into<TargetId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn market(id: impl Into<TargetId>) -> Self {
        Self::new(TargetKind::Market, id)
    }

    pub fn event(id: impl Into<TargetId>) -> Self {
        Self::new(TargetKind::Event, id)
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One keyword of the keyword index with its bound targets
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    /// Lowercased, trimmed keyword (also the key into term masks)
    pub keyword: String,
    /// `plain` projection of the keyword
    pub keyword_plain: String,
    /// `keyword_plain` split on spaces
    pub keyword_tokens: Vec<String>,
    /// Universe of `target_ids`
    pub kind: TargetKind,
    pub target_ids: Vec<TargetId>,
    /// Carries a token from `MatcherConfig::low_signal_tokens`
    pub low_signal: bool,
}

impl KeywordEntry {
    pub fn new(keyword: &str, kind: TargetKind, target_ids: Vec<TargetId>, config: &MatcherConfig) -> Self {
        let keyword = keyword.trim().to_lowercase();
        let keyword_plain = normalize_for_match(&keyword).plain;
        let keyword_tokens: Vec<String> = if keyword_plain.is_empty() {
            Vec::new()
        } else {
            keyword_plain.split(' ').map(str::to_string).collect()
        };
        let low_signal = keyword_tokens.iter().any(|t| config.is_low_signal(t));

        Self {
            keyword,
            keyword_plain,
            keyword_tokens,
            kind,
            target_ids,
            low_signal,
        }
    }

    /// Lookup key in the first-token map
    pub fn first_token(&self) -> Option<&str> {
        self.keyword_tokens
            .first()
            .map(|s| s.as_str())
            .or_else(|| self.keyword.split_whitespace().next())
    }

    /// Label shown for this keyword in results
    pub fn label(&self) -> &str {
        if self.keyword_plain.is_empty() {
            &self.keyword
        } else {
            &self.keyword_plain
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = TargetKey> + '_ {
        self.target_ids
            .iter()
            .map(move |id| TargetKey::new(self.kind, id.clone()))
    }
}

/// Entity gate of one target
#[derive(Debug, Clone, Default)]
pub struct EntityRequirement {
    /// One bit per group; all must be satisfied
    pub required_mask: u32,
    /// Term → bits of every group containing it
    pub term_masks: HashMap<String, u32>,
}

impl EntityRequirement {
    /// Build from canonical groups, keeping at most `max_groups`.
    ///
    /// Returns `None` when there is nothing to require; such a target can
    /// never be selected.
    pub fn from_groups(groups: &[Vec<String>], max_groups: usize) -> Option<Self> {
        let group_count = groups.len().min(max_groups).min(32);
        if group_count == 0 {
            return None;
        }
        let required_mask = if group_count == 32 {
            u32::MAX
        } else {
            (1u32 << group_count) - 1
        };

        let mut term_masks: HashMap<String, u32> = HashMap::new();
        for (i, group) in groups.iter().take(group_count).enumerate() {
            let bit = 1u32 << i;
            for term in group.iter().filter(|t| !t.is_empty()) {
                *term_masks.entry(term.clone()).or_insert(0) |= bit;
            }
        }

        Some(Self {
            required_mask,
            term_masks,
        })
    }

    /// Group bits a keyword satisfies
    #[inline]
    pub fn mask_for(&self, keyword: &str) -> u32 {
        self.term_masks.get(keyword).copied().unwrap_or(0)
    }

    /// All required groups are covered by `satisfied`
    #[inline]
    pub fn is_satisfied_by(&self, satisfied: u32) -> bool {
        self.required_mask != 0 && satisfied & self.required_mask == self.required_mask
    }
}

/// Whether an entity term should survive `@mention` stripping
fn keeps_mention(term: &str) -> bool {
    !term.contains(' ') && (term.chars().count() >= 3 || term == "cz")
}

/// Immutable, versioned index over a dataset
#[derive(Debug, Clone)]
pub struct MatchIndex {
    version: String,
    mode: TargetKind,
    config: MatcherConfig,
    entries: Vec<KeywordEntry>,
    /// First token → positions in `entries`, in build order
    first_token_map: HashMap<String, SmallVec<[usize; 4]>>,
    requirements: HashMap<TargetKey, EntityRequirement>,
    mention_keep_set: HashSet<String>,
}

impl MatchIndex {
    /// Compile a dataset. Events are ingested before markets.
    pub fn build(dataset: &Dataset, config: &MatcherConfig) -> Self {
        let mut requirements: HashMap<TargetKey, EntityRequirement> = HashMap::new();
        let mut mention_keep_set: HashSet<String> = HashSet::new();
        let mut entries: Vec<KeywordEntry> = Vec::new();
        let mut skipped = 0usize;

        let universes: [(TargetKind, Option<&KeywordIndex>); 2] = [
            (TargetKind::Event, dataset.event_index.as_ref()),
            (TargetKind::Market, dataset.index.as_ref()),
        ];

        for (kind, keyword_index) in universes {
            // Market entity terms always feed the keep-set; events only with an event index
            if kind == TargetKind::Event && keyword_index.is_none() {
                continue;
            }

            let gated: Vec<(&TargetId, Vec<Vec<String>>)> = match kind {
                TargetKind::Event => dataset
                    .events
                    .iter()
                    .map(|(id, e)| (id, e.entity_groups()))
                    .collect(),
                TargetKind::Market => dataset
                    .markets
                    .iter()
                    .map(|(id, m)| (id, m.entity_groups()))
                    .collect(),
            };
            for (id, groups) in gated {
                let Some(requirement) =
                    EntityRequirement::from_groups(&groups, config.max_entity_groups)
                else {
                    continue;
                };
                mention_keep_set.extend(
                    requirement
                        .term_masks
                        .keys()
                        .filter(|t| keeps_mention(t))
                        .cloned(),
                );
                requirements.insert(TargetKey::new(kind, id.clone()), requirement);
            }

            for (keyword, ids) in keyword_index.into_iter().flatten() {
                if ids.0.is_empty() || keyword.trim().chars().count() < MIN_KEYWORD_CHARS {
                    skipped += 1;
                    continue;
                }
                entries.push(KeywordEntry::new(keyword, kind, ids.0.clone(), config));
            }
        }

        let mut first_token_map: HashMap<String, SmallVec<[usize; 4]>> = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            if let Some(first) = entry.first_token() {
                first_token_map.entry(first.to_string()).or_default().push(pos);
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "Skipped keyword bindings without targets or too short");
        }

        let index = Self {
            version: dataset_version(dataset),
            mode: dataset.mode(),
            config: config.clone(),
            entries,
            first_token_map,
            requirements,
            mention_keep_set,
        };

        tracing::info!(
            version = %index.short_version(),
            mode = %index.mode,
            keywords = index.entries.len(),
            first_tokens = index.first_token_map.len(),
            gated_targets = index.requirements.len(),
            "Match index built"
        );

        index
    }

    /// Content hash of the dataset this index was built from
    pub fn version(&self) -> &str {
        &self.version
    }

    fn short_version(&self) -> &str {
        &self.version[..self.version.len().min(12)]
    }

    pub fn mode(&self) -> TargetKind {
        self.mode
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Entries whose first token is `token`, in build order
    pub fn candidates_for<'a>(&'a self, token: &str) -> impl Iterator<Item = &'a KeywordEntry> + 'a {
        self.first_token_map
            .get(token)
            .into_iter()
            .flat_map(move |positions| positions.iter().map(move |&p| &self.entries[p]))
    }

    pub fn requirement(&self, key: &TargetKey) -> Option<&EntityRequirement> {
        self.requirements.get(key)
    }

    pub fn mention_keep_set(&self) -> &HashSet<String> {
        &self.mention_keep_set
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    /// Statistics for debugging
    pub fn stats(&self, dataset: &Dataset) -> IndexStats {
        IndexStats {
            version: self.version.clone(),
            mode: self.mode,
            keyword_entries: self.entries.len(),
            first_tokens: self.first_token_map.len(),
            gated_targets: self.requirements.len(),
            keep_set_size: self.mention_keep_set.len(),
            markets: dataset.markets.len(),
            events: dataset.events.len(),
        }
    }
}

/// Hex SHA-256 of the dataset's canonical JSON.
///
/// Maps in `Dataset` are ordered, so equal datasets hash equally.
pub fn dataset_version(dataset: &Dataset) -> String {
    version_from(serde_json::to_vec(dataset), dataset)
}

fn version_from(serialized: serde_json::Result<Vec<u8>>, dataset: &Dataset) -> String {
    let bytes = match serialized {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Dataset did not serialize, hashing its debug form");
            format!("{:?}", dataset).into_bytes()
        }
    };
    hex::encode(Sha256::digest(&bytes))
}

/// Index statistics
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub version: String,
    pub mode: TargetKind,
    pub keyword_entries: usize,
    pub first_tokens: usize,
    pub gated_targets: usize,
    pub keep_set_size: usize,
    pub markets: usize,
    pub events: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Match Index Statistics:")?;
        writeln!(f, "  Version: {}", &self.version[..self.version.len().min(16)])?;
        writeln!(f, "  Mode: {}", self.mode)?;
        writeln!(f, "  Keyword entries: {}", self.keyword_entries)?;
        writeln!(f, "  Distinct first tokens: {}", self.first_tokens)?;
        writeln!(f, "  Entity-gated targets: {}", self.gated_targets)?;
        writeln!(f, "  Mention keep-set: {}", self.keep_set_size)?;
        writeln!(f, "  Markets: {}", self.markets)?;
        writeln!(f, "  Events: {}", self.events)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        serde_json::from_value(json!({
            "index": {
                "Bitcoin ETF": ["m1"],
                "cz": ["m2"],
                "binance": ["m2"],
                "x": ["m1"],
                "orphan": []
            },
            "markets": {
                "m1": { "title": "Bitcoin ETF approved?", "entityGroups": [["bitcoin", "btc"]] },
                "m2": { "title": "Will CZ return?", "entityGroups": [["cz", "changpeng zhao"], ["binance"]] },
                "m3": { "title": "No entities" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_keyword_entry_projection() {
        let config = MatcherConfig::default();
        let entry = KeywordEntry::new("  Bitcoin-ETF ", TargetKind::Market, vec!["m1".into()], &config);
        assert_eq!(entry.keyword, "bitcoin-etf");
        assert_eq!(entry.keyword_plain, "bitcoin etf");
        assert_eq!(entry.keyword_tokens, vec!["bitcoin", "etf"]);
        assert_eq!(entry.first_token(), Some("bitcoin"));
        assert!(!entry.low_signal);
    }

    #[test]
    fn test_keyword_entry_low_signal() {
        let config = MatcherConfig::default();
        let entry = KeywordEntry::new("eth etf", TargetKind::Market, vec!["m1".into()], &config);
        assert!(entry.low_signal);
    }

    #[test]
    fn test_keyword_entry_without_tokens_uses_first_word() {
        let config = MatcherConfig::default();
        let entry = KeywordEntry::new("$$ !!", TargetKind::Market, vec!["m1".into()], &config);
        assert!(entry.keyword_tokens.is_empty());
        assert_eq!(entry.first_token(), Some("$$"));
        assert_eq!(entry.label(), "$$ !!");
    }

    #[test]
    fn test_requirement_masks() {
        let groups = vec![
            vec!["cz".to_string(), "binance".to_string()],
            vec!["binance".to_string()],
        ];
        let req = EntityRequirement::from_groups(&groups, 20).unwrap();
        assert_eq!(req.required_mask, 0b11);
        assert_eq!(req.mask_for("cz"), 0b01);
        assert_eq!(req.mask_for("binance"), 0b11);
        assert_eq!(req.mask_for("trump"), 0);
        assert!(req.is_satisfied_by(0b11));
        assert!(!req.is_satisfied_by(0b01));
    }

    #[test]
    fn test_requirement_caps_groups() {
        let groups: Vec<Vec<String>> = (0..25).map(|i| vec![format!("t{}", i)]).collect();
        let req = EntityRequirement::from_groups(&groups, 20).unwrap();
        assert_eq!(req.required_mask, (1 << 20) - 1);
        assert_eq!(req.mask_for("t24"), 0);
    }

    #[test]
    fn test_requirement_empty_is_none() {
        assert!(EntityRequirement::from_groups(&[], 20).is_none());
    }

    #[test]
    fn test_build_index() {
        let index = MatchIndex::build(&dataset(), &MatcherConfig::default());
        assert_eq!(index.mode(), TargetKind::Market);

        // "orphan" has no targets and "x" is too short
        assert_eq!(index.entries().len(), 3);
        assert_eq!(index.candidates_for("bitcoin").count(), 1);
        assert_eq!(index.candidates_for("etf").count(), 0);

        assert!(index.requirement(&TargetKey::market("m1")).is_some());
        assert!(index.requirement(&TargetKey::market("m3")).is_none());
        assert!(index.requirement(&TargetKey::event("m1")).is_none());
    }

    #[test]
    fn test_mention_keep_set() {
        let index = MatchIndex::build(&dataset(), &MatcherConfig::default());
        let keep = index.mention_keep_set();
        assert!(keep.contains("cz"));
        assert!(keep.contains("binance"));
        assert!(keep.contains("btc"));
        assert!(!keep.contains("changpeng zhao"));
    }

    #[test]
    fn test_version_is_content_hash() {
        let a = MatchIndex::build(&dataset(), &MatcherConfig::default());
        let b = MatchIndex::build(&dataset(), &MatcherConfig::default());
        assert_eq!(a.version(), b.version());
        assert_eq!(a.version().len(), 64);

        let mut changed = dataset();
        changed.markets.remove("m3");
        assert_ne!(a.version(), dataset_version(&changed));
    }

    #[test]
    fn test_version_survives_serialization_failure() {
        let failed = || serde_json::from_str::<serde_json::Value>("{").map(|_| Vec::new());
        let empty = hex::encode(Sha256::digest(b""));

        let mut changed = dataset();
        changed.markets.remove("m3");
        let a = version_from(failed(), &dataset());
        let b = version_from(failed(), &changed);
        assert_ne!(a, empty);
        assert_ne!(a, b);
        assert_eq!(a, version_from(failed(), &dataset()));
    }

    #[test]
    fn test_stats_display() {
        let data = dataset();
        let stats = MatchIndex::build(&data, &MatcherConfig::default()).stats(&data);
        assert_eq!(stats.markets, 3);
        assert_eq!(stats.gated_targets, 2);
        let text = stats.to_string();
        assert!(text.contains("Keyword entries: 3"));
    }
}
