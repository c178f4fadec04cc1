pub mod detail;
pub mod listing;

#[cfg(test)]
pub(crate) mod tests;

pub use detail::extract_detail;
pub use listing::{ListingPage, ListingSelectors, walk_listing};

use scraper::{ElementRef, Selector};

/// Compile a CSS selector, reporting the offending source on failure
pub(crate) fn compile_selector(source: &str) -> Result<Selector, String> {
    Selector::parse(source).map_err(|e| {
        ::log::debug!("Selector `{}` rejected: {}", source, e);
        source.to_string()
    })
}

/// Collects an element's text with whitespace collapsed to single spaces
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
