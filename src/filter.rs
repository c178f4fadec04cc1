use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

/// Configuration for URL filtering in crawlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Hosts that may be fetched; subdomains of a listed host are allowed too
    #[serde(default)]
    pub allowed_domains: BTreeSet<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

/// Static assets never hold catalog markup
pub fn default_exclude_patterns() -> Vec<String> {
    vec![r"\.(jpg|jpeg|png|gif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string()]
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            allowed_domains: BTreeSet::new(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Decides which discovered URLs a crawl may fetch
#[derive(Debug)]
pub struct UrlFilter {
    allowed_domains: BTreeSet<String>,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let allowed_domains = config
            .allowed_domains
            .iter()
            .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(Self {
            allowed_domains,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Filter that only restricts hosts
    pub fn for_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_domains: domains
                .into_iter()
                .map(|d| d.into().to_ascii_lowercase())
                .collect(),
            include_regexes: Vec::new(),
            exclude_regexes: Vec::new(),
        }
    }

    pub fn allowed_domains(&self) -> &BTreeSet<String> {
        &self.allowed_domains
    }

    /// Determine if a URL should be crawled based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !self.is_in_domain_scope(url) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(url_str))
    }

    /// Check if a URL's host is an allowed domain or a subdomain of one
    pub fn is_in_domain_scope(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.allowed_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domains: &[&str]) -> UrlFilterConfig {
        UrlFilterConfig {
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..UrlFilterConfig::default()
        }
    }

    #[test]
    fn test_default_excludes_assets() {
        let filter = UrlFilter::new(config(&["books.toscrape.com"])).unwrap();

        let image_url = Url::parse("https://books.toscrape.com/media/cache/2c/da/cover.jpg").unwrap();
        assert!(!filter.should_crawl(&image_url));

        let page_url = Url::parse("https://books.toscrape.com/catalogue/page-2.html").unwrap();
        assert!(filter.should_crawl(&page_url));
    }

    #[test]
    fn test_domain_restriction() {
        let filter = UrlFilter::new(config(&["books.toscrape.com"])).unwrap();

        let correct_domain = Url::parse("https://books.toscrape.com/index.html").unwrap();
        assert!(filter.should_crawl(&correct_domain));

        let wrong_domain = Url::parse("https://other.com/page").unwrap();
        assert!(!filter.should_crawl(&wrong_domain));

        // Suffix match alone is not a subdomain
        let lookalike = Url::parse("https://evilbooks.toscrape.com.attacker.net/").unwrap();
        assert!(!filter.should_crawl(&lookalike));
        let glued = Url::parse("https://notbooks.toscrape.com/").unwrap();
        assert!(!filter.should_crawl(&glued));
    }

    #[test]
    fn test_subdomains_allowed() {
        let filter = UrlFilter::for_domains(["toscrape.com"]);
        let sub = Url::parse("https://books.toscrape.com/").unwrap();
        assert!(filter.should_crawl(&sub));
        let upper = Url::parse("https://BOOKS.TOSCRAPE.COM/").unwrap();
        assert!(filter.should_crawl(&upper));
    }

    #[test]
    fn test_empty_domain_set_allows_nothing() {
        let filter = UrlFilter::for_domains(Vec::<String>::new());
        let url = Url::parse("https://books.toscrape.com/").unwrap();
        assert!(!filter.should_crawl(&url));
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        let filter = UrlFilter::for_domains(["books.toscrape.com"]);
        let mail = Url::parse("mailto:info@books.toscrape.com").unwrap();
        assert!(!filter.should_crawl(&mail));
    }

    #[test]
    fn test_regex_patterns() {
        let config = UrlFilterConfig {
            allowed_domains: ["example.com".to_string()].into_iter().collect(),
            include_patterns: vec![r"/catalogue/".to_string()],
            exclude_patterns: vec![r"/catalogue/category/".to_string()],
        };
        let filter = UrlFilter::new(config).unwrap();

        let included = Url::parse("https://example.com/catalogue/page-2.html").unwrap();
        assert!(filter.should_crawl(&included));

        let not_included = Url::parse("https://example.com/about.html").unwrap();
        assert!(!filter.should_crawl(&not_included));

        let excluded = Url::parse("https://example.com/catalogue/category/books_1/index.html").unwrap();
        assert!(!filter.should_crawl(&excluded));
    }

    #[test]
    fn test_normalize_url_strips_fragment() {
        let filter = UrlFilter::for_domains(["example.com"]);
        let url = Url::parse("https://example.com/a.html#reviews").unwrap();
        assert_eq!(filter.normalize_url(&url).as_str(), "https://example.com/a.html");
    }
}
