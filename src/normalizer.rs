//! Conversion of raw extracted strings into typed record fields.
//!
//! Every function here is pure. A field the target record requires but the
//! raw record lacks is an error, never a silent default.

use crate::error::NormalizationError;
use crate::results::{Field, NormalizedRecord, RawRecord};
use rust_decimal::Decimal;
use std::str::FromStr;
use url::Url;

/// Currency glyphs stripped before parsing a price. The mis-decoded pound
/// sign must come before the plain one.
const CURRENCY_GLYPHS: [&str; 4] = ["Â£", "£", "$", "€"];

/// Word to rating mapping used by `star-rating <Word>` class names
const STAR_WORDS: [(&str, u8); 5] = [("One", 1), ("Two", 2), ("Three", 3), ("Four", 4), ("Five", 5)];

/// Normalize a raw record into a typed record
pub fn normalize(raw: RawRecord) -> Result<NormalizedRecord, NormalizationError> {
    let url_raw = required(&raw, Field::Url)?;
    let url = Url::parse(url_raw.trim())
        .map_err(|e| NormalizationError::invalid(Field::Url, url_raw, e.to_string()))?;

    let title = required(&raw, Field::Title)?.trim();
    if title.is_empty() {
        return Err(NormalizationError::invalid(Field::Title, title, "empty title"));
    }

    Ok(NormalizedRecord {
        url,
        title: title.to_string(),
        product_type: normalize_product_type(required(&raw, Field::ProductType)?),
        price: parse_price(required(&raw, Field::Price)?)?,
        availability_count: parse_availability(required(&raw, Field::Availability)?)?,
        number_of_reviews: parse_count(Field::NumberOfReviews, required(&raw, Field::NumberOfReviews)?)?,
        star_rating: parse_star_rating(required(&raw, Field::StarRating)?)?,
        description: raw
            .get(Field::Description)
            .map(|d| d.trim().to_string())
            .unwrap_or_default(),
    })
}

fn required(raw: &RawRecord, field: Field) -> Result<&str, NormalizationError> {
    raw.get(field).ok_or(NormalizationError::Missing(field))
}

/// Lower-case a product type
pub fn normalize_product_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Parse a price such as `£12.34`, tolerating a mis-encoded pound sign
pub fn parse_price(raw: &str) -> Result<Decimal, NormalizationError> {
    let mut amount = raw.trim();
    for glyph in CURRENCY_GLYPHS {
        if let Some(rest) = amount.strip_prefix(glyph) {
            amount = rest.trim_start();
            break;
        }
    }

    let price = Decimal::from_str(amount)
        .map_err(|e| NormalizationError::invalid(Field::Price, raw, e.to_string()))?;
    if price.is_sign_negative() {
        return Err(NormalizationError::invalid(Field::Price, raw, "negative price"));
    }
    Ok(price)
}

/// Extract the stock count from text like `In stock (22 available)`.
///
/// Text without an opening parenthesis carries no count and yields 0.
pub fn parse_availability(raw: &str) -> Result<u32, NormalizationError> {
    let mut parts = raw.split('(');
    parts.next();
    let Some(after_paren) = parts.next() else {
        return Ok(0);
    };

    let token = after_paren.split(' ').next().unwrap_or_default();
    token
        .parse::<u32>()
        .map_err(|e| NormalizationError::invalid(Field::Availability, raw, e.to_string()))
}

/// Parse a plain non-negative integer field
pub fn parse_count(field: Field, raw: &str) -> Result<u32, NormalizationError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|e| NormalizationError::invalid(field, raw, e.to_string()))
}

/// Map a class attribute such as `star-rating Three` to its rating
pub fn parse_star_rating(raw: &str) -> Result<u8, NormalizationError> {
    let word = raw
        .split_whitespace()
        .find(|token| *token != "star-rating")
        .ok_or_else(|| NormalizationError::invalid(Field::StarRating, raw, "no rating word"))?;

    STAR_WORDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(word))
        .map(|(_, stars)| *stars)
        .ok_or_else(|| {
            NormalizationError::invalid(Field::StarRating, raw, format!("unknown rating `{word}`"))
        })
}
