//! Dataset schema consumed by the index builder
//!
//! The dataset is produced upstream (keyword extraction + entity curation)
//! and shipped as JSON. The schema is deliberately lenient: ids may arrive
//! as strings or numbers, and entity requirements come in two encodings:
//!
//! - `entityGroups`: `[["cz", "changpeng zhao"], ["binance"]]`, an AND of
//!   OR-groups; a bare string element counts as a one-term group
//! - `entities` (legacy): `["cz", "binance"]`, each term its own group
//!
//! Both are converted to the canonical nested form by
//! [`canonical_entity_groups`] before the index ever sees them. Anything that
//! does not fit is dropped rather than rejected.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{LinkingError, Result};

/// Market or event id
pub type TargetId = String;

/// Which universe a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Market,
    Event,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ids bound to one keyword; non-scalar entries are dropped on load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIds(#[serde(deserialize_with = "de_ids")] pub Vec<TargetId>);

/// Keyword → target ids
pub type KeywordIndex = BTreeMap<String, TargetIds>;

/// Entity requirement as found on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityGroupsField {
    List(Vec<GroupSpec>),
    Malformed(Value),
}

/// One element of an entity list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupSpec {
    /// Interchangeable terms, any one satisfies the group
    AnyOf(Vec<Value>),
    /// A single term (or junk)
    Single(Value),
}

/// YES/NO display labels of a binary market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeLabels {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub yes_label: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub no_label: Option<String>,
}

/// A single tradable market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<OutcomeLabels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_groups: Option<EntityGroupsField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityGroupsField>,
    /// Parent event for an option of a multi-option event
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<TargetId>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
    /// `"multi"` for options of a multi-option event
    #[serde(
        rename = "type",
        default,
        deserialize_with = "de_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub market_type: Option<String>,
    /// Fields the matcher does not interpret, passed through to results
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Market {
    /// Whether this market is one option of a multi-option event
    pub fn is_multi_option(&self, id: &str) -> bool {
        self.market_type.as_deref() == Some("multi")
            || self.event_id.as_deref().is_some_and(|event_id| event_id != id)
    }
}

/// A multi-option event grouping several markets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, deserialize_with = "de_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de_ids")]
    pub market_ids: Vec<TargetId>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub best_market_id: Option<TargetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_groups: Option<EntityGroupsField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityGroupsField>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Targets that carry an entity requirement
pub trait EntityGated {
    fn entity_groups_field(&self) -> Option<&EntityGroupsField>;
    fn entities_field(&self) -> Option<&EntityGroupsField>;

    /// Canonical AND-of-OR groups, lowercase and trimmed
    fn entity_groups(&self) -> Vec<Vec<String>> {
        canonical_entity_groups(self.entity_groups_field(), self.entities_field())
    }
}

impl EntityGated for Market {
    fn entity_groups_field(&self) -> Option<&EntityGroupsField> {
        self.entity_groups.as_ref()
    }
    fn entities_field(&self) -> Option<&EntityGroupsField> {
        self.entities.as_ref()
    }
}

impl EntityGated for Event {
    fn entity_groups_field(&self) -> Option<&EntityGroupsField> {
        self.entity_groups.as_ref()
    }
    fn entities_field(&self) -> Option<&EntityGroupsField> {
        self.entities.as_ref()
    }
}

/// Full matcher input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Keyword → market ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<KeywordIndex>,
    /// Keyword → event ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_index: Option<KeywordIndex>,
    #[serde(default)]
    pub markets: BTreeMap<TargetId, Market>,
    #[serde(default)]
    pub events: BTreeMap<TargetId, Event>,
}

impl Dataset {
    /// Parse a dataset from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a dataset from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| LinkingError::io(path, e))?;
        Self::from_json_str(&content)
    }

    /// Primary universe: events when the dataset exposes an event index
    pub fn mode(&self) -> TargetKind {
        if self.event_index.is_some() {
            TargetKind::Event
        } else {
            TargetKind::Market
        }
    }

    pub fn market(&self, id: &str) -> Option<&Market> {
        self.markets.get(id)
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    /// Whether the dataset knows a target
    pub fn contains(&self, kind: TargetKind, id: &str) -> bool {
        match kind {
            TargetKind::Market => self.markets.contains_key(id),
            TargetKind::Event => self.events.contains_key(id),
        }
    }
}

/// Convert either entity encoding into canonical AND-of-OR groups.
///
/// `entityGroups` wins whenever it is a list, even one that normalizes to
/// nothing; legacy `entities` is only consulted when `entityGroups` is absent
/// or not a list. Empty terms and empty groups are dropped.
pub fn canonical_entity_groups(
    groups: Option<&EntityGroupsField>,
    entities: Option<&EntityGroupsField>,
) -> Vec<Vec<String>> {
    if let Some(EntityGroupsField::List(specs)) = groups {
        return specs
            .iter()
            .filter_map(|spec| {
                let group: Vec<String> = match spec {
                    GroupSpec::AnyOf(terms) => terms.iter().filter_map(term_text).collect(),
                    GroupSpec::Single(Value::String(term)) => {
                        normalize_term(term).into_iter().collect()
                    }
                    GroupSpec::Single(_) => Vec::new(),
                };
                (!group.is_empty()).then_some(group)
            })
            .collect();
    }

    if let Some(EntityGroupsField::List(specs)) = entities {
        return specs
            .iter()
            .filter_map(|spec| match spec {
                GroupSpec::Single(value) => term_text(value).map(|t| vec![t]),
                GroupSpec::AnyOf(_) => None,
            })
            .collect();
    }

    Vec::new()
}

fn normalize_term(term: &str) -> Option<String> {
    let t = term.trim().to_lowercase();
    (!t.is_empty()).then_some(t)
}

/// Scalar JSON term as lowercase text
fn term_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_term(s),
        Value::Number(n) => normalize_term(&n.to_string()),
        _ => None,
    }
}

/// Scalar JSON id as text
fn id_text(value: &Value) -> Option<TargetId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<TargetId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => items.iter().filter_map(id_text).collect(),
        _ => Vec::new(),
    })
}

fn de_opt_id<'de, D>(deserializer: D) -> std::result::Result<Option<TargetId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(id_text))
}

/// Display text; null or non-string values read as absent
fn de_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn de_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_string(deserializer)?.unwrap_or_default())
}
