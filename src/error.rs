//! Error handling for the market linker
//!
//! Matching itself never fails: every "no match" outcome is modelled as data
//! in [`crate::market_linking::MatchResult`]. Errors only arise at the file
//! and configuration boundary (loading datasets and tunables).

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dataset and configuration loading
#[derive(Error, Debug)]
pub enum LinkingError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dataset JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },
}

impl LinkingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

/// Result type alias for loading operations
pub type Result<T> = std::result::Result<T, LinkingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = LinkingError::invalid("cjk_max_ngram", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'cjk_max_ngram': must be at least 1"
        );
    }

    #[test]
    fn test_io_error_names_path() {
        let err = LinkingError::io(
            "missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.to_string().contains("missing.json"));
    }
}
