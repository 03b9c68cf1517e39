//! Market Linker - match social posts to prediction markets
//!
//! Given a keyword dataset of markets and events, this crate finds the
//! markets a short passage of text is talking about. Keywords are scored
//! against the passage, every target must have its required entities
//! confidently mentioned, and the surviving targets are ranked.
//!
//! ## Quick Start
//!
//! ```rust
//! use market_linker::config::MatcherConfig;
//! use market_linker::market_linking::{match_text, Dataset, MatchIndex, MatchOptions};
//!
//! let dataset = Dataset::from_json_str(r#"{
//!     "index": { "bitcoin etf": ["m1"] },
//!     "markets": { "m1": { "title": "Bitcoin ETF approved?", "entityGroups": [["bitcoin etf"]] } }
//! }"#).unwrap();
//! let config = MatcherConfig::default();
//! let index = MatchIndex::build(&dataset, &config);
//!
//! let result = match_text(&dataset, &index, "Bitcoin ETF approved!", &MatchOptions::from_config(&config));
//! assert!(result.is_matched());
//! assert_eq!(result.best().unwrap().id, "m1");
//! ```

// Core error handling
pub mod error;

// Matcher tunables
pub mod config;

// Keyword index, scoring and ranking
pub mod market_linking;

pub use config::MatcherConfig;
pub use error::{LinkingError, Result};
pub use market_linking::{
    best_match, match_text, Dataset, MarketLinkingService, MarketLinkingServiceImpl, MatchIndex,
    MatchOptions, MatchResult,
};
