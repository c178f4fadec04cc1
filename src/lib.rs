// Re-export modules
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod normalizer;
pub mod parsers;
pub mod results;

// Re-export commonly used types for convenience
pub use config::CrawlConfig;
pub use crawlers::{CrawlEnd, CrawlHandle, CrawlOutcome, CrawlSummary, Fetch, MemoryFetcher, WebDriverFetcher};
pub use error::{ConfigError, CrawlError, ExtractionError, FetchError, NormalizationError, UrlFailure};
pub use normalizer::normalize;
pub use parsers::{extract_detail, walk_listing};
pub use results::{Field, MarkupDocument, NormalizedRecord, PageKind, RawRecord};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Builder for a catalog crawl
pub struct Crawl {
    start_url: String,
    config: CrawlConfig,
    cancel: CancellationToken,
}

impl Crawl {
    /// Create a new crawl builder starting at the given listing page
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            config: CrawlConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Apply a configuration
    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(
        mut self,
        path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        self.config = CrawlConfig::from_file(path)?;
        Ok(self)
    }

    /// Restrict fetching to these hosts and their subdomains
    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum number of concurrent fetch workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set how many times a failed fetch is retried
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the per-fetch timeout, rounded up to whole seconds
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.config.fetch_timeout_secs = timeout.as_secs().saturating_add(partial).max(1);
        self
    }

    /// Stop the crawl when this token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Start the crawl and get a handle to its record stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F: Fetch + 'static>(self, fetcher: F) -> Result<CrawlHandle, CrawlError> {
        let start_url = Url::parse(&self.start_url)
            .map_err(|_| CrawlError::InvalidStartUrl(self.start_url.clone()))?;
        crawlers::orchestrator::start(start_url, self.config, Arc::new(fetcher), self.cancel)
    }
}

/// Crawl from `start_url` with default settings, fetching only `allowed_domains`
pub fn crawl<F, I, S>(start_url: &str, allowed_domains: I, fetcher: F) -> Result<CrawlHandle, CrawlError>
where
    F: Fetch + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Crawl::new(start_url)
        .with_allowed_domains(allowed_domains)
        .start(fetcher)
}
