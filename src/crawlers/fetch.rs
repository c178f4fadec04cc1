use crate::error::FetchError;
use crate::results::MarkupDocument;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Retrieves the markup of a page
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<MarkupDocument, FetchError>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, url: &Url) -> Result<MarkupDocument, FetchError> {
        (**self).fetch(url).await
    }
}

/// Serves pages from memory, with optional scripted failures.
///
/// Unknown URLs answer with a 404 status error. Every call is counted so
/// tests can assert how often a URL was requested.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<Url, String>,
    failures: Mutex<HashMap<Url, VecDeque<FetchError>>>,
    calls: Mutex<Vec<Url>>,
    delay: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        match Url::parse(url) {
            Ok(url) => {
                self.pages.insert(url, html.into());
            }
            Err(e) => ::log::warn!("Ignoring page with invalid URL {:?}: {}", url, e),
        }
        self
    }

    /// Fail the next fetches of `url` with these errors, in order
    pub fn with_failures(mut self, url: &str, errors: impl IntoIterator<Item = FetchError>) -> Self {
        if let Ok(url) = Url::parse(url) {
            if let Ok(failures) = self.failures.get_mut() {
                failures.entry(url).or_default().extend(errors);
            }
        }
        self
    }

    /// Sleep this long before answering each fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches issued for `url`
    pub fn fetch_count(&self, url: &str) -> usize {
        let Ok(url) = Url::parse(url) else {
            return 0;
        };
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|u| **u == url).count())
            .unwrap_or(0)
    }

    /// All fetches issued, in call order
    pub fn fetched_urls(&self) -> Vec<Url> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetch for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<MarkupDocument, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.get_mut(url).and_then(VecDeque::pop_front));
        if let Some(error) = scripted {
            return Err(error);
        }

        self.pages
            .get(url)
            .map(|html| MarkupDocument::new(url.clone(), html.clone()))
            .ok_or(FetchError::Status(404))
    }
}
