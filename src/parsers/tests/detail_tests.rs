use super::detail_html;
use crate::error::ExtractionError;
use crate::parsers::detail::extract_detail;
use crate::results::{Field, MarkupDocument};
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://books.toscrape.com/catalogue/sharp-objects_997/index.html";

    fn doc(html: String) -> MarkupDocument {
        MarkupDocument::new(Url::parse(URL).unwrap(), html)
    }

    #[test]
    fn test_extracts_all_fields() {
        let html = detail_html("Sharp Objects", Some("Â£47.82"), "In stock (20 available)", "Four");
        let record = extract_detail(&doc(html)).unwrap();

        assert_eq!(record.get(Field::Url), Some(URL));
        assert_eq!(record.get(Field::Title), Some("Sharp Objects"));
        assert_eq!(record.get(Field::ProductType), Some("Books"));
        assert_eq!(record.get(Field::Price), Some("Â£47.82"));
        assert_eq!(record.get(Field::Availability), Some("In stock (20 available)"));
        assert_eq!(record.get(Field::NumberOfReviews), Some("0"));
        assert_eq!(record.get(Field::StarRating), Some("star-rating Four"));
        assert_eq!(record.get(Field::Description), Some("A story about Sharp Objects."));
    }

    #[test]
    fn test_missing_price_is_extraction_error() {
        let html = detail_html("Sharp Objects", None, "In stock (20 available)", "Four");
        let err = extract_detail(&doc(html)).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::MissingField {
                field: Field::Price,
                url: Url::parse(URL).unwrap(),
            }
        );
    }

    #[test]
    fn test_missing_title_is_extraction_error() {
        let html = detail_html("", Some("£1.00"), "In stock", "One");
        match extract_detail(&doc(html)) {
            Err(ExtractionError::MissingField { field, .. }) => assert_eq!(field, Field::Title),
            other => panic!("expected missing title, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let html = r#"<html><body><h1>Plain</h1><table>
            <tr><td>x</td></tr><tr><td>Books</td></tr><tr><td>£3.00</td></tr>
        </table></body></html>"#;
        let record = extract_detail(&doc(html.to_string())).unwrap();
        assert_eq!(record.get(Field::Description), Some(""));
        assert_eq!(record.get(Field::Price), Some("£3.00"));
        // Rows past the end of the table and the rating are simply absent
        assert!(!record.contains(Field::Availability));
        assert!(!record.contains(Field::StarRating));
    }
}
