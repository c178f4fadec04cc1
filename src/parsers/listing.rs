use crate::error::ConfigError;
use crate::parsers::compile_selector;
use crate::results::MarkupDocument;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// CSS selectors used to read a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Anchors linking to detail pages
    #[serde(default = "default_item_link")]
    pub item_link: String,

    /// Anchor linking to the next listing page
    #[serde(default = "default_next_link")]
    pub next_link: String,
}

fn default_item_link() -> String {
    "article h3 a".to_string()
}

fn default_next_link() -> String {
    "li.next a".to_string()
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item_link: default_item_link(),
            next_link: default_next_link(),
        }
    }
}

impl ListingSelectors {
    /// Compile both selectors
    pub fn compile(&self) -> Result<CompiledListingSelectors, ConfigError> {
        Ok(CompiledListingSelectors {
            item_link: compile_selector(&self.item_link).map_err(ConfigError::Selector)?,
            next_link: compile_selector(&self.next_link).map_err(ConfigError::Selector)?,
        })
    }
}

/// Listing selectors ready to match against a document
#[derive(Debug, Clone)]
pub struct CompiledListingSelectors {
    item_link: Selector,
    next_link: Selector,
}

impl Default for CompiledListingSelectors {
    fn default() -> Self {
        ListingSelectors::default()
            .compile()
            .expect("Default listing selectors should be valid")
    }
}

/// Links discovered on one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Detail pages in document order
    pub detail_urls: Vec<Url>,

    /// The following listing page, if any
    pub next_page: Option<Url>,
}

impl ListingPage {
    pub fn detail_urls(&self) -> impl Iterator<Item = &Url> {
        self.detail_urls.iter()
    }
}

/// Walks a listing page with the default selectors
pub fn walk_listing(page: &MarkupDocument, base_url: &Url) -> ListingPage {
    walk_listing_with(page, base_url, &CompiledListingSelectors::default())
}

/// Walks a listing page, resolving every href against `base_url`
pub fn walk_listing_with(
    page: &MarkupDocument,
    base_url: &Url,
    selectors: &CompiledListingSelectors,
) -> ListingPage {
    let doc = Html::parse_document(&page.source);

    let mut seen = HashSet::new();
    let detail_urls = doc
        .select(&selectors.item_link)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| resolve(base_url, href))
        .filter(|url| seen.insert(url.clone()))
        .collect::<Vec<_>>();

    let next_page = doc
        .select(&selectors.next_link)
        .filter_map(|e| e.value().attr("href"))
        .find_map(|href| resolve(base_url, href));

    ::log::debug!(
        "Listing {} has {} detail links, next page: {:?}",
        page.url,
        detail_urls.len(),
        next_page.as_ref().map(Url::as_str)
    );

    ListingPage {
        detail_urls,
        next_page,
    }
}

/// Resolve an href as a relative reference, dropping any fragment
fn resolve(base_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base_url.join(href) {
        Ok(mut url) => {
            url.set_fragment(None);
            Some(url)
        }
        Err(e) => {
            ::log::warn!("Skipping unresolvable link {:?} on {}: {}", href, base_url, e);
            None
        }
    }
}
