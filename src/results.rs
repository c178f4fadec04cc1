use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// A fetched page: its final URL and HTML source
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    /// URL the page was served from
    pub url: Url,

    /// Raw HTML source
    pub source: String,
}

impl MarkupDocument {
    /// Create a new document
    pub fn new(url: Url, source: impl Into<String>) -> Self {
        Self {
            url,
            source: source.into(),
        }
    }
}

/// Fields extracted from a detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Url,
    Title,
    ProductType,
    Price,
    Availability,
    NumberOfReviews,
    StarRating,
    Description,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Url => "url",
            Field::Title => "title",
            Field::ProductType => "productType",
            Field::Price => "price",
            Field::Availability => "availability",
            Field::NumberOfReviews => "numberOfReviews",
            Field::StarRating => "starRating",
            Field::Description => "description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Untyped field values pulled straight from markup.
///
/// A field that the page did not provide is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: BTreeMap<Field, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value
    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    /// Builder-style variant of [`RawRecord::insert`]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A validated, typed catalog record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    /// Absolute URL of the detail page, unique within a crawl
    pub url: Url,

    /// Item title
    pub title: String,

    /// Lower-cased product type
    pub product_type: String,

    /// Non-negative price
    pub price: Decimal,

    /// Units in stock, 0 when the page gives no count
    pub availability_count: u32,

    /// Number of reviews
    pub number_of_reviews: u32,

    /// Star rating between 0 and 5
    pub star_rating: u8,

    /// Item description, possibly empty
    pub description: String,
}

/// How a discovered URL is processed once fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// A page enumerating items, possibly with a next-page link
    Listing,
    /// A page describing a single item
    Detail,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Listing => f.write_str("listing"),
            PageKind::Detail => f.write_str("detail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_record_serializes_with_camel_case_fields() {
        let record = NormalizedRecord {
            url: Url::parse("https://books.toscrape.com/catalogue/sharp-objects_997/index.html").unwrap(),
            title: "Sharp Objects".to_string(),
            product_type: "books".to_string(),
            price: Decimal::from_str("47.82").unwrap(),
            availability_count: 20,
            number_of_reviews: 0,
            star_rating: 4,
            description: String::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["productType"], "books");
        assert_eq!(json["availabilityCount"], 20);
        assert_eq!(json["starRating"], 4);
        assert_eq!(json["price"], "47.82");
        assert_eq!(
            json["url"],
            "https://books.toscrape.com/catalogue/sharp-objects_997/index.html"
        );

        let back: NormalizedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_raw_record_absent_fields() {
        let raw = RawRecord::new().with(Field::Title, "Sharp Objects");
        assert_eq!(raw.get(Field::Title), Some("Sharp Objects"));
        assert_eq!(raw.get(Field::Price), None);
        assert!(!raw.contains(Field::Description));
        assert_eq!(raw.len(), 1);
        assert_eq!(Field::NumberOfReviews.to_string(), "numberOfReviews");
    }
}
