use catalog_crawl::CrawlConfig;
use clap::Parser;
use std::path::PathBuf;

/// Catalog page crawled when neither the command line nor the config names one
pub const DEFAULT_START_URL: &str = "https://books.toscrape.com/";

#[derive(Parser, Debug)]
#[command(name = "catalog-crawl")]
#[command(about = "Crawls a paginated catalog and emits normalized item records as JSON lines")]
#[command(version)]
pub struct Args {
    /// Listing page to start from
    pub start_url: Option<String>,

    /// Host that may be fetched (repeatable; defaults to the start URL's host)
    #[arg(short = 'd', long = "allowed-domain")]
    pub allowed_domains: Vec<String>,

    /// Number of concurrent fetch workers
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Times a failed fetch is retried before the URL is given up
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-fetch timeout in seconds
    #[arg(long)]
    pub fetch_timeout: Option<u64>,

    /// Path to a JSON crawl configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebDriver server URL (also read from WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Write records to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Layer command-line overrides on top of a loaded configuration
    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if !self.allowed_domains.is_empty() {
            config.allowed_domains = self.allowed_domains.iter().cloned().collect();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(fetch_timeout) = self.fetch_timeout {
            config.fetch_timeout_secs = fetch_timeout;
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            config.webdriver_url = webdriver_url.clone();
        }
        config
    }

    /// Start URL from the command line, then the config, then the default
    pub fn start_url(&self, config: &CrawlConfig) -> String {
        self.start_url
            .clone()
            .or_else(|| config.start_url.clone())
            .unwrap_or_else(|| DEFAULT_START_URL.to_string())
    }
}
