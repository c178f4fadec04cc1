use crate::error::ExtractionError;
use crate::parsers::{compile_selector, element_text};
use crate::results::{Field, MarkupDocument, RawRecord};
use scraper::{ElementRef, Html, Selector};

/// Where a field's raw value comes from on a detail page
#[derive(Debug, Clone, Copy)]
enum Source {
    /// Text of the first element matching the selector
    Text(&'static str),
    /// Text of the first `td` in the n-th `table tr` row
    TableRow(usize),
    /// Attribute of the first element matching the selector
    Attr(&'static str, &'static str),
}

struct Rule {
    field: Field,
    source: Source,
    required: bool,
}

/// Extraction rules in application order. The table rows are positional
/// and break if the page layout changes.
const RULES: [Rule; 7] = [
    Rule { field: Field::Title, source: Source::Text("h1"), required: true },
    Rule { field: Field::ProductType, source: Source::TableRow(1), required: false },
    Rule { field: Field::Price, source: Source::TableRow(2), required: true },
    Rule { field: Field::Availability, source: Source::TableRow(5), required: false },
    Rule { field: Field::NumberOfReviews, source: Source::TableRow(6), required: false },
    Rule { field: Field::StarRating, source: Source::Attr("p.star-rating", "class"), required: false },
    Rule { field: Field::Description, source: Source::Text("#product_description ~ p"), required: false },
];

/// Extracts the raw fields of a detail page
pub fn extract_detail(page: &MarkupDocument) -> Result<RawRecord, ExtractionError> {
    let doc = Html::parse_document(&page.source);
    let rows = select_all(&doc, "table tr")?;

    let mut record = RawRecord::new().with(Field::Url, page.url.as_str());

    for rule in RULES.iter() {
        let value = match rule.source {
            Source::Text(selector) => {
                select_first(&doc, selector)?.map(element_text)
            }
            Source::TableRow(index) => match rows.get(index) {
                Some(row) => first_in(*row, "td")?.map(element_text),
                None => None,
            },
            Source::Attr(selector, attr) => select_first(&doc, selector)?
                .and_then(|e| e.value().attr(attr))
                .map(|v| v.trim().to_string()),
        };

        match value.filter(|v| !v.is_empty()) {
            Some(v) => record.insert(rule.field, v),
            None if rule.required => {
                return Err(ExtractionError::MissingField {
                    field: rule.field,
                    url: page.url.clone(),
                });
            }
            None if rule.field == Field::Description => record.insert(rule.field, ""),
            None => {
                ::log::trace!("No {} on {}", rule.field, page.url);
            }
        }
    }

    Ok(record)
}

fn parse(selector: &str) -> Result<Selector, ExtractionError> {
    compile_selector(selector).map_err(ExtractionError::InvalidSelector)
}

fn select_all<'a>(doc: &'a Html, selector: &str) -> Result<Vec<ElementRef<'a>>, ExtractionError> {
    let selector = parse(selector)?;
    Ok(doc.select(&selector).collect())
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Result<Option<ElementRef<'a>>, ExtractionError> {
    let selector = parse(selector)?;
    Ok(doc.select(&selector).next())
}

fn first_in<'a>(element: ElementRef<'a>, selector: &str) -> Result<Option<ElementRef<'a>>, ExtractionError> {
    let selector = parse(selector)?;
    Ok(element.select(&selector).next())
}
