//! Market linking: match free text to prediction-market targets.
//!
//! Two public surfaces:
//!
//! 1. **`match_text()`**: ranks every market or event the passage refers to
//!    and returns the top-N with scores, reasons and display fields.
//!
//! 2. **`best_match()`**: the same ranking collapsed to one entry per topic
//!    (options of a multi-option event share a topic) for inline display.
//!
//! Both run over a [`MatchIndex`] compiled once from a [`Dataset`]:
//!
//! ```text
//! passage ─► normalize ─► tokenize ─► first-token candidates ─► score_entry
//!                                                     │
//!                                     is_entry_mentioned ─► entity groups
//!                                                     ▼
//!                                          aggregate ─► gate ─► rank
//! ```
//!
//! ## Invariants
//!
//! - A target is returned only when every one of its entity groups is
//!   satisfied by a confident mention; a target without groups never is.
//! - `score_entry` is bounded to `[0, 1]`; accumulated target scores are not.
//! - The index is immutable. Refreshing the dataset builds a new index and
//!   swaps it in (see [`MarketLinkingServiceImpl::reload`]).
//! - Matching is pure: the same index and text always give the same result.

pub mod aggregate;
pub mod dataset;
pub mod index;
pub mod mention;
pub mod normalize;
pub mod result;
pub mod scorer;
pub mod service;
pub mod tokenize;
pub mod topic;

// Re-export key types at module boundary
pub use aggregate::{aggregate, Aggregation, MatchAccumulator, RankedTargets};
pub use dataset::{Dataset, EntityGated, Event, Market, OutcomeLabels, TargetId, TargetKind};
pub use index::{dataset_version, EntityRequirement, IndexStats, KeywordEntry, MatchIndex, TargetKey};
pub use mention::{is_entry_mentioned, SatisfiedGroups};
pub use normalize::{normalize_for_match, normalize_text, strip_mentions, NormalizedText};
pub use result::{
    match_text, MarketSummary, MatchOptions, MatchResult, NoMatchReason, RankedMatch, TargetMatch,
};
pub use scorer::{score_entry, EntryScore, ScoreReason};
pub use service::{LinkingSnapshot, MarketLinkingService, MarketLinkingServiceImpl};
pub use tokenize::{tokenize, TokenSet, TokenizedText};
pub use topic::{best_match, BestMatch, TopicMatch};
