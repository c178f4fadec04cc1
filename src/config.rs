use crate::error::ConfigError;
use crate::filter::{UrlFilter, UrlFilterConfig, default_exclude_patterns};
use crate::parsers::ListingSelectors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Configuration for a catalog crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// URL to start crawling from, when not given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    /// Hosts that may be fetched (defaults to the start URL's host when empty)
    #[serde(default)]
    pub allowed_domains: BTreeSet<String>,

    /// Times a failed fetch is re-queued before the URL is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on a single fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause before a failed fetch is re-queued, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long an in-flight fetch may keep running after cancellation
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Regex patterns for URLs to include
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Selectors for listing pages
    #[serde(default)]
    pub listing: ListingSelectors,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Records buffered before workers wait on the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Default value for max_retries
fn default_max_retries() -> u32 {
    3
}

/// Default value for fetch_timeout_secs
fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Default value for concurrency
fn default_concurrency() -> usize {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Largest record buffer a crawl may request
pub const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

fn default_channel_capacity() -> usize {
    1024
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: None,
            allowed_domains: BTreeSet::new(),
            max_retries: default_max_retries(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            concurrency: default_concurrency(),
            retry_backoff_ms: default_retry_backoff_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
            listing: ListingSelectors::default(),
            webdriver_url: default_webdriver_url(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the crawler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be at least 1".into()));
        }
        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "channel_capacity must be at most {}",
                MAX_CHANNEL_CAPACITY
            )));
        }
        self.listing.compile()?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Build the URL filter, falling back to the start URL's host when no
    /// domains are configured
    pub fn url_filter(&self, start_url: &Url) -> Result<UrlFilter, ConfigError> {
        let mut allowed_domains = self.allowed_domains.clone();
        if allowed_domains.is_empty() {
            if let Some(host) = start_url.host_str() {
                allowed_domains.insert(host.to_string());
            }
        }

        let filter = UrlFilter::new(UrlFilterConfig {
            allowed_domains,
            include_patterns: self.include_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
        })?;
        Ok(filter)
    }

    /// Apply the `WEBDRIVER_URL` environment override if it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::from_json("{}").unwrap();
        assert_eq!(config, CrawlConfig::default());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.concurrency, 1);
        assert!(config.allowed_domains.is_empty());
    }

    #[test]
    fn test_overrides_from_json() {
        let config = CrawlConfig::from_json(
            r#"{
                "start_url": "https://books.toscrape.com/",
                "allowed_domains": ["books.toscrape.com"],
                "max_retries": 1,
                "concurrency": 4,
                "listing": { "next_link": "a.next" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.start_url.as_deref(), Some("https://books.toscrape.com/"));
        assert!(config.allowed_domains.contains("books.toscrape.com"));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.listing.next_link, "a.next");
        assert_eq!(config.listing.item_link, "article h3 a");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            CrawlConfig::from_json(r#"{"concurrency": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CrawlConfig::from_json(r#"{"listing": {"item_link": "h3 >>> a"}}"#),
            Err(ConfigError::Selector(_))
        ));
        assert!(matches!(
            CrawlConfig::from_json(r#"{"max_retries": "many"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_channel_capacity_bounds() {
        assert!(matches!(
            CrawlConfig::from_json(r#"{"channel_capacity": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        let too_large = CrawlConfig {
            channel_capacity: usize::MAX,
            ..CrawlConfig::default()
        };
        assert!(matches!(too_large.validate(), Err(ConfigError::Invalid(_))));
        let largest = CrawlConfig {
            channel_capacity: MAX_CHANNEL_CAPACITY,
            ..CrawlConfig::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_url_filter_defaults_to_start_host() {
        let config = CrawlConfig::default();
        let start = Url::parse("https://books.toscrape.com/").unwrap();
        let filter = config.url_filter(&start).unwrap();
        assert!(filter.allowed_domains().contains("books.toscrape.com"));
        assert!(!filter.should_crawl(&Url::parse("https://other.com/").unwrap()));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let config = CrawlConfig {
            exclude_patterns: vec!["(unclosed".to_string()],
            ..CrawlConfig::default()
        };
        let start = Url::parse("https://books.toscrape.com/").unwrap();
        assert!(matches!(config.url_filter(&start), Err(ConfigError::Pattern(_))));
    }

    #[test]
    fn test_retry_backoff_grows_with_attempt() {
        let config = CrawlConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_millis(250));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(750));
    }
}
