//! Matcher configuration and structured file loading.
//!
//! Configuration is TOML by default; any file with a `.json` extension is
//! read as JSON instead. Every field has a default, so a config file only
//! needs to name what it changes.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::calibrate::DEFAULT_SMOOTHING;
use crate::error::{ConfigError, ConfigResult};
use crate::network::ObservableId;

/// Which searcher backend to open at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearcherKind {
    /// In-memory index loaded from a JSON array of records.
    Memory { records: PathBuf },
    /// In-memory index rebuilt from a redb store directory.
    Durable { path: PathBuf },
}

impl SearcherKind {
    pub fn name(&self) -> &'static str {
        match self {
            SearcherKind::Memory { .. } => "memory",
            SearcherKind::Durable { .. } => "durable",
        }
    }
}

impl Default for SearcherKind {
    fn default() -> Self {
        SearcherKind::Memory {
            records: PathBuf::from("records.json"),
        }
    }
}

/// Configuration for [`crate::matcher::ClassificationMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Candidates requested from the searcher per attempt.
    pub max_candidates: usize,
    /// A match is valid only above this posterior.
    pub min_posterior: f64,
    /// Runner-up posteriors within this distance of the best are ambiguous.
    pub ambiguity_tolerance: f64,
    /// Memoised match results. 0 disables the cache.
    pub cache_capacity: usize,
    /// At least one of these must match for a valid result. Empty means any
    /// observable.
    pub required: Vec<ObservableId>,
    /// Query fields dropped, in order, when no valid match is found.
    pub broaden: Vec<ObservableId>,
    /// Field holding the rank, for higher/lower order match flags.
    pub rank_observable: Option<ObservableId>,
    /// Field the `accepted` pointer of a synonym refers to. Defaults to the
    /// network root.
    pub key_observable: Option<ObservableId>,
    /// Additive smoothing for calibration.
    pub smoothing: f64,
    pub searcher: SearcherKind,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_candidates: 20,
            min_posterior: 0.8,
            ambiguity_tolerance: 1e-6,
            cache_capacity: 1024,
            required: Vec::new(),
            broaden: Vec::new(),
            rank_observable: None,
            key_observable: None,
            smoothing: DEFAULT_SMOOTHING,
            searcher: SearcherKind::default(),
        }
    }
}

impl MatcherConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config: Self = read_structured(path)?;
        tracing::debug!(path = %path.display(), ?config, "matcher config loaded");
        Ok(config)
    }
}

/// Read a TOML or JSON file into `T`, chosen by extension.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    } else {
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matcher.toml");
        std::fs::write(
            &path,
            r#"
                min_posterior = 0.9
                required = ["scientificName"]

                [searcher]
                kind = "durable"
                path = "/var/lib/taxolink"
            "#,
        )
        .unwrap();

        let config = MatcherConfig::load(&path).unwrap();
        assert_eq!(config.min_posterior, 0.9);
        assert_eq!(config.max_candidates, 20);
        assert_eq!(config.required, vec![ObservableId::new("scientificName")]);
        assert_eq!(config.searcher.name(), "durable");
    }

    #[test]
    fn json_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matcher.json");
        std::fs::write(&path, r#"{"cache_capacity": 0}"#).unwrap();
        let config = MatcherConfig::load(&path).unwrap();
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.searcher, SearcherKind::default());
    }

    #[test]
    fn errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            MatcherConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "max_candidates = \"many\"").unwrap();
        match MatcherConfig::load(&bad) {
            Err(ConfigError::Parse { path, .. }) => assert!(path.ends_with("bad.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
