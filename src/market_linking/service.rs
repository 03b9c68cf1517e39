//! MarketLinkingService - runtime interface for passage matching.
//!
//! The service owns the current dataset and its compiled index as one
//! immutable [`LinkingSnapshot`]. Each call clones the snapshot `Arc` and
//! works on it without holding the lock, so a reload never blocks or
//! disturbs in-flight matches.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use super::dataset::Dataset;
use super::index::{IndexStats, MatchIndex};
use super::result::{match_text, MatchOptions, MatchResult};
use super::topic::{best_match, BestMatch};
use crate::config::MatcherConfig;
use crate::error::Result;

// =============================================================================
// Trait Definition
// =============================================================================

/// Trait for linking service implementations.
///
/// Allows callers to hold `Arc<dyn MarketLinkingService>` and tests to swap in
/// fixed fakes.
pub trait MarketLinkingService: Send + Sync {
    /// Version of the dataset currently served (hex SHA-256).
    fn snapshot_version(&self) -> String;

    /// Rank targets for a passage.
    fn match_text(&self, text: &str, options: &MatchOptions) -> MatchResult;

    /// Topic-deduplicated best match for inline display.
    fn best_match(&self, text: &str) -> Option<BestMatch>;

    fn stats(&self) -> IndexStats;
}

// =============================================================================
// Snapshot
// =============================================================================

/// A dataset together with the index compiled from it
#[derive(Debug)]
pub struct LinkingSnapshot {
    pub dataset: Dataset,
    pub index: MatchIndex,
}

impl LinkingSnapshot {
    pub fn build(dataset: Dataset, config: &MatcherConfig) -> Self {
        let index = MatchIndex::build(&dataset, config);
        Self { dataset, index }
    }

    pub fn version(&self) -> &str {
        self.index.version()
    }
}

// =============================================================================
// Implementation
// =============================================================================

/// Standard implementation backed by a swappable snapshot.
pub struct MarketLinkingServiceImpl {
    config: MatcherConfig,
    snapshot: RwLock<Arc<LinkingSnapshot>>,
}

impl MarketLinkingServiceImpl {
    pub fn new(dataset: Dataset, config: MatcherConfig) -> Self {
        let snapshot = LinkingSnapshot::build(dataset, &config);
        Self {
            config,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load the dataset JSON and, when given, a YAML config.
    pub fn from_files(dataset_path: impl AsRef<Path>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => MatcherConfig::from_file(path)?,
            None => MatcherConfig::default(),
        };
        let dataset = Dataset::from_file(dataset_path)?;
        Ok(Self::new(dataset, config))
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Current snapshot; stays valid across reloads.
    pub fn snapshot(&self) -> Arc<LinkingSnapshot> {
        // Readers only clone the Arc, so a poisoned lock still holds a whole snapshot
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the dataset.
    ///
    /// The new index is built before the lock is taken. Returns `false` when
    /// the dataset is unchanged and nothing was swapped.
    pub fn reload(&self, dataset: Dataset) -> bool {
        let current = self.snapshot();
        let next = LinkingSnapshot::build(dataset, &self.config);
        if next.version() == current.version() {
            tracing::debug!(version = %next.version(), "Dataset unchanged, keeping index");
            return false;
        }

        let previous = current.version().to_string();
        let version = next.version().to_string();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        tracing::info!(%previous, %version, "Swapped match index");
        true
    }

    /// Reload from a dataset file.
    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<bool> {
        let dataset = Dataset::from_file(path)?;
        Ok(self.reload(dataset))
    }
}

impl MarketLinkingService for MarketLinkingServiceImpl {
    fn snapshot_version(&self) -> String {
        self.snapshot().version().to_string()
    }

    fn match_text(&self, text: &str, options: &MatchOptions) -> MatchResult {
        let snapshot = self.snapshot();
        match_text(&snapshot.dataset, &snapshot.index, text, options)
    }

    fn best_match(&self, text: &str) -> Option<BestMatch> {
        let snapshot = self.snapshot();
        best_match(&snapshot.dataset, &snapshot.index, text)
    }

    fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        snapshot.index.stats(&snapshot.dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(keyword: &str) -> Dataset {
        serde_json::from_value(json!({
            "index": { keyword: ["m1"] },
            "markets": { "m1": { "title": "M1", "entityGroups": [[keyword]] } }
        }))
        .unwrap()
    }

    #[test]
    fn test_service_is_object_safe() {
        let service: Arc<dyn MarketLinkingService> =
            Arc::new(MarketLinkingServiceImpl::new(dataset("tesla"), MatcherConfig::default()));
        let options = MatchOptions::new(5, 0.6);
        assert!(service.match_text("tesla earnings", &options).is_matched());
        assert!(service.best_match("tesla earnings").is_some());
        assert_eq!(service.stats().markets, 1);
    }

    #[test]
    fn test_reload_swaps_only_on_change() {
        let service = MarketLinkingServiceImpl::new(dataset("tesla"), MatcherConfig::default());
        let v1 = service.snapshot_version();

        assert!(!service.reload(dataset("tesla")));
        assert_eq!(service.snapshot_version(), v1);

        assert!(service.reload(dataset("nvidia")));
        assert_ne!(service.snapshot_version(), v1);
    }

    #[test]
    fn test_in_flight_snapshot_survives_reload() {
        let service = MarketLinkingServiceImpl::new(dataset("tesla"), MatcherConfig::default());
        let held = service.snapshot();

        service.reload(dataset("nvidia"));

        let options = MatchOptions::new(5, 0.6);
        assert!(match_text(&held.dataset, &held.index, "tesla", &options).is_matched());
        assert!(!service.match_text("tesla", &options).is_matched());
        assert!(service.match_text("nvidia", &options).is_matched());
    }

    #[test]
    fn test_from_files_reports_missing_dataset() {
        let result = MarketLinkingServiceImpl::from_files("/nonexistent/data.json", None);
        assert!(result.is_err());
    }
}
