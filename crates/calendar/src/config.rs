//! Tunables for the timeline and search engine
//!
//! Both load from JSON files in the Almanac config directory and fall back to
//! defaults for missing files and missing fields.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timeline settings filename in the Almanac config directory
const TIMELINE_FILE: &str = "timeline.json";

/// Search settings filename in the Almanac config directory
const SEARCH_FILE: &str = "search.json";

/// Settings for [`crate::timeline::Timeline`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Defer the global range pass until the next dispatch so that several
    /// subscriber range changes in one loop turn re-point monitors once
    pub coalesce_range_updates: bool,
    /// Maximum number of monitor notifications handled per dispatch
    pub dispatch_batch_size: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            coalesce_range_updates: false,
            dispatch_batch_size: 256,
        }
    }
}

impl TimelineConfig {
    /// Load from ~/.config/almanac/timeline.json, or defaults
    pub fn load() -> Result<Self> {
        config::load_json_or_default(TIMELINE_FILE)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file_or_default(path)
    }
}

/// Settings for [`crate::search::SearchEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Months searched on each side of "now"
    pub window_months: u32,
    /// Maximum number of hits kept by a search
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            window_months: 6,
            max_results: 50,
        }
    }
}

impl SearchConfig {
    /// Load from ~/.config/almanac/search.json, or defaults
    pub fn load() -> Result<Self> {
        config::load_json_or_default(SEARCH_FILE)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file_or_default(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_timeline_config() {
        let config: TimelineConfig =
            serde_json::from_str(r#"{ "coalesce_range_updates": true }"#).unwrap();
        assert!(config.coalesce_range_updates);
        assert_eq!(config.dispatch_batch_size, 256);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SearchConfig::from_file(&dir.path().join("search.json")).unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_search_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{ "window_months": 2, "max_results": 5 }"#).unwrap();

        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.window_months, 2);
        assert_eq!(config.max_results, 5);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timeline.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(TimelineConfig::from_file(&path).is_err());
    }
}
