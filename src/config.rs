//! Runtime configuration for the scraper.
//!
//! Configuration is read from an optional YAML file. Every field has a
//! default, so an absent file or a partial one yields a working setup that
//! targets the built-in list of spine industry sites.
//!
//! # Example
//!
//! ```yaml
//! output_dir: ./spine_industry_data
//! max_articles_per_site: 10
//! retry:
//!   max_attempts: 4
//! sites:
//!   - name: Spine Market Group
//!     base_url: https://thespinemarketgroup.com/
//!     category_label: industry_news
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// One configured target website.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteDescriptor {
    pub name: String,
    pub base_url: String,
    pub category_label: String,
}

impl SiteDescriptor {
    pub fn new(name: &str, base_url: &str, category_label: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            category_label: category_label.to_string(),
        }
    }
}

/// Retry policy applied to every page fetch.
///
/// The delay before retry `n` (1-based) is
/// `min(base_delay * 2^(n-1), max_delay) + uniform(0..=jitter)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per fetch, including the first one.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Upper bound on a single attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_ms: 250,
            attempt_timeout_secs: 30,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Pauses that keep the scraper from hammering target sites.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Politeness {
    pub article_delay_min_ms: u64,
    pub article_delay_max_ms: u64,
    pub site_delay_ms: u64,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            article_delay_min_ms: 3_000,
            article_delay_max_ms: 7_000,
            site_delay_ms: 10_000,
        }
    }
}

/// Rules for turning homepage links into candidate article URLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkFilter {
    /// A link must contain at least one of these (case-insensitive).
    pub include_keywords: Vec<String>,
    /// A link containing any of these is dropped.
    pub skip_patterns: Vec<String>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            include_keywords: strings(&["news", "article", "2025", "2024", "spine", "medical"]),
            skip_patterns: strings(&["#", "javascript:", "mailto:", ".jpg", ".png"]),
        }
    }
}

/// Term lists used by the content classifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Vocabularies {
    pub procedures: Vec<String>,
    pub financial: Vec<String>,
}

impl Default for Vocabularies {
    fn default() -> Self {
        Self {
            procedures: strings(&[
                "spinal fusion",
                "fusion",
                "discectomy",
                "laminectomy",
                "foraminotomy",
                "cervical",
                "lumbar",
                "thoracic",
                "ACDF",
                "TLIF",
                "PLIF",
                "ALIF",
                "disc replacement",
                "navigation",
                "robotic surgery",
            ]),
            financial: strings(&[
                "$",
                "million",
                "billion",
                "revenue",
                "market share",
                "growth",
                "CAGR",
                "acquisition",
                "funding",
                "valuation",
            ]),
        }
    }
}

/// Top-level scraper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub output_dir: PathBuf,
    pub max_articles_per_site: usize,
    /// Articles whose normalized text is not longer than this are skipped.
    pub min_content_length: usize,
    pub log_capacity: usize,
    pub status_log_lines: usize,
    pub logs_endpoint_lines: usize,
    pub results_sample_lines: usize,
    pub retry: RetryPolicy,
    pub politeness: Politeness,
    pub links: LinkFilter,
    pub sites: Vec<SiteDescriptor>,
    pub vocabularies: Vocabularies,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("spine_industry_data"),
            max_articles_per_site: 20,
            min_content_length: 50,
            log_capacity: 200,
            status_log_lines: 20,
            logs_endpoint_lines: 50,
            results_sample_lines: 5,
            retry: RetryPolicy::default(),
            politeness: Politeness::default(),
            links: LinkFilter::default(),
            sites: default_sites(),
            vocabularies: Vocabularies::default(),
        }
    }
}

impl ScraperConfig {
    /// Load configuration from a YAML file, or fall back to defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let parsed = Self::from_yaml(&raw)?;
                info!(path = %path.display(), sites = parsed.sites.len(), "Loaded configuration file");
                parsed
            }
            None => {
                info!("No config file given; using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "retry.attempt_timeout_secs must be at least 1".into(),
            ));
        }
        if self.politeness.article_delay_min_ms > self.politeness.article_delay_max_ms {
            return Err(ConfigError::Invalid(
                "politeness.article_delay_min_ms exceeds article_delay_max_ms".into(),
            ));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::Invalid("log_capacity must be at least 1".into()));
        }
        for site in &self.sites {
            url::Url::parse(&site.base_url).map_err(|e| {
                ConfigError::Invalid(format!("site '{}' has a bad base_url: {e}", site.name))
            })?;
        }
        Ok(())
    }
}

fn default_sites() -> Vec<SiteDescriptor> {
    vec![
        SiteDescriptor::new(
            "Spine Market Group",
            "https://thespinemarketgroup.com/",
            "industry_news",
        ),
        SiteDescriptor::new("Spine Market", "https://spine-market.com/", "market_research"),
        SiteDescriptor::new(
            "Ortho Spine News",
            "https://orthospinenews.com/",
            "research_reports",
        ),
        SiteDescriptor::new(
            "Becker's Spine Review",
            "https://www.beckersspine.com/",
            "healthcare_insights",
        ),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScraperConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sites.len(), 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
output_dir: /tmp/spine
retry:
  max_attempts: 5
sites:
  - name: Acme Spine News
    base_url: https://acme.example/
    category_label: industry_news
"#;
        let config = ScraperConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/spine"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].name, "Acme Spine News");
        assert_eq!(config.max_articles_per_site, 20);
        assert!(config.vocabularies.procedures.contains(&"laminectomy".to_string()));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ScraperConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let mut config = ScraperConfig::default();
        config.politeness.article_delay_min_ms = 10;
        config.politeness.article_delay_max_ms = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_site_url() {
        let mut config = ScraperConfig::default();
        config.sites = vec![SiteDescriptor::new("Broken", "not a url", "industry_news")];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = ScraperConfig::load(None).unwrap();
        assert_eq!(config, ScraperConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.yaml");
        std::fs::write(&path, "max_articles_per_site: 3\n").unwrap();
        let config = ScraperConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_articles_per_site, 3);
    }
}
