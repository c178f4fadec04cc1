mod detail_tests;

/// Builds a listing page with the given detail hrefs and optional next href
pub(crate) fn listing_html(detail_hrefs: &[&str], next_href: Option<&str>) -> String {
    let articles = detail_hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<li><article class="product_pod"><h3><a href="{href}" title="t">Book</a></h3>
                <p class="price_color">£10.00</p></article></li>"#
            )
        })
        .collect::<String>();
    let pager = next_href
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{href}">next</a></li></ul>"#))
        .unwrap_or_default();
    format!("<html><body><section><ol class=\"row\">{articles}</ol>{pager}</section></body></html>")
}

/// Builds a detail page; `None` for price truncates the table before the price row
pub(crate) fn detail_html(title: &str, price: Option<&str>, availability: &str, stars: &str) -> String {
    let rest_rows = price
        .map(|p| {
            format!(
                "<tr><th>Price (excl. tax)</th><td>{p}</td></tr>
                <tr><th>Price (incl. tax)</th><td>£51.77</td></tr>
                <tr><th>Tax</th><td>£0.00</td></tr>
                <tr><th>Availability</th><td>{availability}</td></tr>
                <tr><th>Number of reviews</th><td>0</td></tr>"
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><article class="product_page">
        <div class="product_main"><h1>{title}</h1>
        <p class="star-rating {stars}"><i class="icon-star"></i></p></div>
        <div id="product_description" class="sub-header"><h2>Product Description</h2></div>
        <p>A  story
           about {title}.</p>
        <table class="table table-striped">
        <tr><th>UPC</th><td>a897fe39b1053632</td></tr>
        <tr><th>Product Type</th><td>Books</td></tr>
        {rest_rows}
        </table></article></body></html>"#
    )
}
