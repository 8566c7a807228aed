//! Runtime configuration loaded from an optional YAML file.
//!
//! Every section carries `#[serde(default)]`, so a missing file, an empty
//! file or a file that only overrides one value are all valid. Command-line
//! flags (see [`crate::cli`]) are applied on top of the loaded values.
//!
//! ```yaml
//! database_path: data/database.db
//! labeler:
//!   model_dir: models/all-MiniLM-L6-v2
//!   accept_threshold: 0.85
//! hunter:
//!   entries_per_feed: 5
//! ```

use crate::verdict::{VerdictClass, VerdictRule};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid {name}: {value} (expected a finite value in [-1, 1])")]
    InvalidThreshold { name: &'static str, value: f32 },
}

/// Top-level configuration shared by every subcommand.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Location of the SQLite store.
    pub database_path: PathBuf,
    pub labeler: LabelerConfig,
    pub hunter: HunterConfig,
    pub judge: JudgeConfig,
    pub classifier: ClassifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/database.db"),
            labeler: LabelerConfig::default(),
            hunter: HunterConfig::default(),
            judge: JudgeConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load a YAML config file, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a YAML string. An empty document yields the defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// Settings of the semantic labeler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    /// Identifier of the sentence-embedding model, used in logs.
    pub model_name: String,
    /// Directory holding `config.json`, `model.safetensors` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Best-match score at or above which a label is written.
    pub accept_threshold: f32,
    /// Best-match score at or above which a sub-threshold match is reported.
    pub candidate_threshold: f32,
    /// Token limit applied to titles and claims before embedding.
    pub max_seq_len: usize,
    /// Ordered verdict rules; the first rule with a matching keyword wins.
    pub verdict_rules: Vec<VerdictRule>,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            accept_threshold: 0.85,
            candidate_threshold: 0.5,
            max_seq_len: 256,
            verdict_rules: default_verdict_rules(),
        }
    }
}

impl LabelerConfig {
    /// Reject thresholds that a cosine similarity can never be compared against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("accept_threshold", self.accept_threshold),
            ("candidate_threshold", self.candidate_threshold),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// PolitiFact vocabulary. REAL comes last so `barely-true` and `half-true` never read as REAL.
pub fn default_verdict_rules() -> Vec<VerdictRule> {
    vec![
        VerdictRule::new(VerdictClass::Fake, ["false", "pants-fire", "barely-true"]),
        VerdictRule::new(VerdictClass::Ambiguous, ["half-true"]),
        VerdictRule::new(VerdictClass::Real, ["true", "mostly-true"]),
    ]
}

/// A news feed watched by the hunter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Settings of the RSS news hunter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HunterConfig {
    pub feeds: Vec<FeedSource>,
    /// Only the newest entries of each feed are downloaded.
    pub entries_per_feed: usize,
    /// Pages with this many characters of body text or fewer are discarded.
    pub min_text_len: usize,
    pub request_timeout_secs: u64,
    /// Pause between two article downloads.
    pub delay_ms: u64,
    pub user_agent: String,
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            feeds: vec![
                FeedSource::new("Reuters World", "http://feeds.reuters.com/reuters/worldNews"),
                FeedSource::new(
                    "NY Times World",
                    "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
                ),
                FeedSource::new("BBC News", "http://feeds.bbci.co.uk/news/world/rss.xml"),
                FeedSource::new("The Onion (Satire)", "https://www.theonion.com/rss"),
                FeedSource::new("Babylon Bee (Satire)", "https://babylonbee.com/feed"),
                FeedSource::new("Daily Mail", "https://www.dailymail.co.uk/news/index.rss"),
            ],
            entries_per_feed: 5,
            min_text_len: 150,
            request_timeout_secs: 10,
            delay_ms: 1000,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl HunterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Settings of the PolitiFact scraper.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// List page URL; `{}` is replaced by the page number.
    pub base_url: String,
    /// Site root used to resolve relative fact-check links.
    pub site_root: String,
    pub pages: u32,
    /// Stored in `fact_checks.checker_site` and quoted in label sources.
    pub checker_site: String,
    pub request_timeout_secs: u64,
    pub delay_ms: u64,
    pub user_agent: String,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.politifact.com/factchecks/list/?page={}".to_string(),
            site_root: "https://www.politifact.com".to_string(),
            pages: 20,
            checker_site: "PolitiFact".to_string(),
            request_timeout_secs: 10,
            delay_ms: 1000,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl JudgeConfig {
    pub fn page_url(&self, page: u32) -> String {
        self.base_url.replace("{}", &page.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Settings of the bag-of-words classifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Where the trained pipeline is written as JSON.
    pub model_path: PathBuf,
    /// Recorded with every prediction.
    pub model_version: String,
    /// Share of labeled articles held out for evaluation.
    pub test_size: f64,
    pub seed: u64,
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Undersample every class to the size of the minority class before splitting.
    pub balance_classes: bool,
    /// Train/test accuracy gap above which overfitting is reported.
    pub overfit_threshold: f64,
    /// Number of predictions shown in the console preview.
    pub preview_rows: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/bow_logit_v1.json"),
            model_version: "bow_logit_v1".to_string(),
            test_size: 0.2,
            seed: 0,
            c: 1.0,
            max_iter: 500,
            learning_rate: 1.0,
            balance_classes: false,
            overfit_threshold: 0.05,
            preview_rows: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_order() {
        let rules = default_verdict_rules();
        let classes: Vec<VerdictClass> = rules.iter().map(|r| r.class).collect();
        assert_eq!(
            classes,
            vec![VerdictClass::Fake, VerdictClass::Ambiguous, VerdictClass::Real]
        );
    }

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.database_path, PathBuf::from("data/database.db"));
        assert_eq!(config.labeler.accept_threshold, 0.85);
        assert_eq!(config.labeler.candidate_threshold, 0.5);
        assert_eq!(config.hunter.feeds.len(), 6);
        assert_eq!(config.judge.pages, 20);
        assert_eq!(config.classifier.model_version, "bow_logit_v1");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let raw = r#"
database_path: /tmp/lake.db
labeler:
  accept_threshold: 0.9
judge:
  pages: 3
"#;
        let config = AppConfig::from_yaml(raw).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/lake.db"));
        assert_eq!(config.labeler.accept_threshold, 0.9);
        assert_eq!(config.labeler.candidate_threshold, 0.5);
        assert_eq!(config.labeler.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.judge.pages, 3);
        assert_eq!(config.judge.checker_site, "PolitiFact");
        assert_eq!(config.hunter.entries_per_feed, 5);
    }

    #[test]
    fn test_custom_verdict_rules() {
        let raw = r#"
labeler:
  verdict_rules:
    - class: fake
      keywords: ["four pinocchios"]
    - class: real
      keywords: ["geppetto checkmark"]
"#;
        let config = AppConfig::from_yaml(raw).unwrap();
        assert_eq!(config.labeler.verdict_rules.len(), 2);
        assert_eq!(config.labeler.verdict_rules[0].class, VerdictClass::Fake);
        assert_eq!(config.labeler.verdict_rules[1].keywords, vec!["geppetto checkmark"]);
    }

    #[test]
    fn test_threshold_validation() {
        let mut config = LabelerConfig::default();
        assert!(config.validate().is_ok());

        config.accept_threshold = 0.0;
        assert!(config.validate().is_ok());

        config.accept_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { name: "accept_threshold", .. })
        ));

        config.accept_threshold = 0.85;
        config.candidate_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_url() {
        let judge = JudgeConfig::default();
        assert_eq!(
            judge.page_url(3),
            "https://www.politifact.com/factchecks/list/?page=3"
        );
    }

    #[test]
    fn test_load_without_path() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.labeler.max_seq_len, 256);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
