//! Item detail page extraction
//!
//! Each field has an ordered list of strategies; the first one that finds a value
//! wins and a field no strategy finds is simply left out. Field extraction is a
//! pure function of the page HTML ([`extract_fields`]), so markup drift only ever
//! costs individual fields.

use crate::crawler::fetcher::{fetch_with_retry, FetchFailure, PageFetcher, PageKind, RetryPolicy};
use crate::models::{FieldValue, ItemField, ItemStub, RawRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetches item detail pages and turns them into raw records
pub struct ItemExtractor {
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ItemExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            retry,
            cancel,
        }
    }

    /// Fetches and parses the detail page of `stub`
    ///
    /// Never fails: a page that cannot be fetched yields a `Failed` record with no
    /// fields, a page missing some fields yields a `Partial` one.
    pub async fn extract(&self, stub: ItemStub) -> RawRecord {
        let result = fetch_with_retry(
            self.fetcher.as_ref(),
            &stub.source_url,
            PageKind::Detail,
            &self.retry,
            &self.cancel,
        )
        .await;

        match result {
            Ok(body) => {
                let page_url = Url::parse(&stub.source_url).ok();
                let fields = extract_fields(&body, page_url.as_ref());
                let raw = RawRecord::from_fields(stub, fields);

                if !raw.missing_fields().is_empty() {
                    tracing::debug!(
                        "Partial extraction for {}: missing {}",
                        raw.stub.source_url,
                        raw.missing_fields()
                            .iter()
                            .map(ItemField::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                raw
            }
            Err(FetchFailure::Fetch(e)) => {
                tracing::warn!("Failed to extract {}: {}", stub.source_url, e);
                RawRecord::failed(stub)
            }
            Err(FetchFailure::Cancelled) => {
                tracing::debug!("Extraction of {} cancelled", stub.source_url);
                RawRecord::failed(stub)
            }
        }
    }
}

/// Extracts every field that can be found in a detail page
///
/// `page_url` is used to make a relative developer website absolute.
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::extract_fields;
/// use catalog_harvest::models::{FieldValue, ItemField};
///
/// let html = r#"<html><body><h1> Acme Reviews </h1><main>Free to install</main></body></html>"#;
/// let fields = extract_fields(html, None);
///
/// assert_eq!(fields.get(&ItemField::AppName), Some(&FieldValue::from("Acme Reviews")));
/// assert_eq!(fields.get(&ItemField::Price), Some(&FieldValue::from("Free to install")));
/// assert!(fields.get(&ItemField::Rating).is_none());
/// ```
pub fn extract_fields(html: &str, page_url: Option<&Url>) -> BTreeMap<ItemField, FieldValue> {
    let document = Html::parse_document(html);
    let blob = page_text(&document);
    let aggregate = json_ld_aggregate_rating(&document);
    let rating_pattern = rating_pattern_match(&blob);

    let mut fields = BTreeMap::new();

    if let Some(name) = first_text(&document, &["h1"]) {
        fields.insert(ItemField::AppName, FieldValue::Text(name));
    }

    if let Some(short) = meta_content(&document, "meta[name='description']")
        .or_else(|| meta_content(&document, "meta[property='og:description']"))
    {
        fields.insert(ItemField::ShortDescription, FieldValue::Text(short));
    }

    if let Some(full) = first_text(&document, &["#app-details", "[data-app-details]", "main p"]) {
        fields.insert(ItemField::FullDescription, FieldValue::Text(full));
    }

    let (developer_name, developer_website) = developer_info(&document, page_url);
    if let Some(name) = developer_name {
        fields.insert(ItemField::DeveloperName, FieldValue::Text(name));
    }
    if let Some(website) = developer_website {
        fields.insert(ItemField::DeveloperWebsite, FieldValue::Text(website));
    }

    let rating = aria_rating(&document)
        .or_else(|| {
            aggregate
                .as_ref()
                .and_then(|a| json_value(a, &["ratingValue"]))
        })
        .or_else(|| {
            rating_pattern
                .as_ref()
                .map(|(rating, _)| FieldValue::Text(rating.clone()))
        });
    if let Some(rating) = rating {
        fields.insert(ItemField::Rating, rating);
    }

    let reviews = aggregate
        .as_ref()
        .and_then(|a| json_value(a, &["reviewCount", "ratingCount"]))
        .or_else(|| {
            rating_pattern
                .as_ref()
                .map(|(_, reviews)| FieldValue::Text(reviews.clone()))
        })
        .or_else(|| reviews_phrase(&blob).map(FieldValue::Text));
    if let Some(reviews) = reviews {
        fields.insert(ItemField::ReviewsCount, reviews);
    }

    if let Some(price) = price_text(&blob) {
        fields.insert(ItemField::Price, FieldValue::Text(price));
    }

    fields
}

/// Visible text of `<main>`, or of the whole body when there is no `<main>`
fn page_text(document: &Html) -> String {
    for selector in ["main", "body"] {
        if let Ok(selector) = Selector::parse(selector) {
            if let Some(element) = document.select(&selector).next() {
                return collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            }
        }
    }
    String::new()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First non-empty element text over an ordered list of selectors
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document.select(&selector).find_map(|e| element_text(&e))
    })
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| !c.is_empty())
}

/// Name and website from the `<dd>` following a "Developer" `<dt>`
fn developer_info(document: &Html, page_url: Option<&Url>) -> (Option<String>, Option<String>) {
    let (Ok(dt_selector), Ok(a_selector)) = (Selector::parse("dt"), Selector::parse("a")) else {
        return (None, None);
    };

    let Some(dd) = document
        .select(&dt_selector)
        .find(|dt| {
            dt.text()
                .collect::<String>()
                .to_lowercase()
                .contains("developer")
        })
        .and_then(|dt| {
            dt.next_siblings()
                .filter_map(ElementRef::wrap)
                .next()
                .filter(|sibling| sibling.value().name() == "dd")
        })
    else {
        return (None, None);
    };

    match dd.select(&a_selector).next() {
        Some(link) => {
            let name = element_text(&link);
            let website = link
                .value()
                .attr("href")
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .map(|href| match page_url.and_then(|base| base.join(href).ok()) {
                    Some(absolute) => absolute.to_string(),
                    None => href.to_string(),
                });
            (name, website)
        }
        None => (element_text(&dd), None),
    }
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("number regex is valid"))
}

/// Rating from an accessibility label such as "4.8 out of 5 stars"
fn aria_rating(document: &Html) -> Option<FieldValue> {
    let selector = Selector::parse("[aria-label]").ok()?;

    document
        .select(&selector)
        .filter_map(|e| e.value().attr("aria-label"))
        .filter(|label| {
            let label = label.to_lowercase();
            label.contains("out of 5") || label.contains("stars")
        })
        .find_map(|label| number_regex().find(label))
        .map(|m| FieldValue::Text(m.as_str().to_string()))
}

/// The first `aggregateRating` object found in any JSON-LD block
fn json_ld_aggregate_rating(document: &Html) -> Option<Value> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    document
        .select(&selector)
        .filter_map(|script| serde_json::from_str::<Value>(&script.inner_html()).ok())
        .find_map(|value| find_key(&value, "aggregateRating").cloned())
}

fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

fn json_value(object: &Value, keys: &[&str]) -> Option<FieldValue> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) if !s.trim().is_empty() => Some(FieldValue::Text(s.trim().to_string())),
        _ => None,
    })
}

/// Rating and review count from text like `4.8 (1,234 reviews)`
fn rating_pattern_match(blob: &str) -> Option<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(\d(?:[.,]\d)?)\s*\(\s*(\d[\d,\s]*?)\s*(?:reviews?)?\s*\)")
            .expect("rating regex is valid")
    });

    let caps = re.captures(blob)?;
    Some((caps[1].to_string(), caps[2].trim().to_string()))
}

/// Review count from text like `1,234 reviews` or `1.2k reviews`
fn reviews_phrase(blob: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?\s*[km]?)\s*reviews?\b").expect("reviews regex is valid")
    });

    re.captures(blob).map(|caps| caps[1].trim().to_string())
}

/// Pricing text: free markers, then a recurring amount, then any dollar amount
fn price_text(blob: &str) -> Option<String> {
    static RECURRING: OnceLock<Regex> = OnceLock::new();
    static AMOUNT: OnceLock<Regex> = OnceLock::new();

    for marker in ["Free to install", "Free plan"] {
        if blob.contains(marker) {
            return Some(marker.to_string());
        }
    }

    let recurring = RECURRING.get_or_init(|| {
        Regex::new(r"(?i)(From\s*)?\$\s*\d+(?:\.\d+)?\s*(?:/|\sper\s)\s*(month|mo|year|yr)\b")
            .expect("recurring price regex is valid")
    });
    if let Some(m) = recurring.find(blob) {
        return Some(m.as_str().trim().to_string());
    }

    let amount = AMOUNT.get_or_init(|| {
        Regex::new(r"(?i)(From\s*)?\$\s*\d+(?:\.\d+)?").expect("price regex is valid")
    });
    amount.find(blob).map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::testing::{fast_retry, ScriptedFetcher};
    use crate::state::FetchStatus;

    const COMPLETE_PAGE: &str = r#"
        <html>
        <head>
            <meta name="description" content="  Collect product reviews  ">
            <meta property="og:description" content="OG text">
        </head>
        <body>
            <header><a href="/pricing">Pricing $99</a></header>
            <main>
                <h1>Acme Reviews</h1>
                <div aria-label="4.8 out of 5 stars">★★★★★</div>
                <span>4.8</span> <span>(1,234 reviews)</span>
                <p>Free plan available. Paid plans from $9.99/month.</p>
                <div id="app-details"><p>Acme helps merchants  collect reviews.</p></div>
                <dl>
                    <dt>Languages</dt><dd>English</dd>
                    <dt>Developer</dt>
                    <dd><a href="https://acme.example.org/">Acme Inc.</a></dd>
                </dl>
            </main>
        </body>
        </html>
    "#;

    fn text(fields: &BTreeMap<ItemField, FieldValue>, field: ItemField) -> Option<&str> {
        fields.get(&field).and_then(FieldValue::as_text)
    }

    #[test]
    fn test_complete_page() {
        let fields = extract_fields(COMPLETE_PAGE, None);

        assert_eq!(text(&fields, ItemField::AppName), Some("Acme Reviews"));
        assert_eq!(
            text(&fields, ItemField::ShortDescription),
            Some("Collect product reviews")
        );
        assert_eq!(
            text(&fields, ItemField::FullDescription),
            Some("Acme helps merchants collect reviews.")
        );
        assert_eq!(text(&fields, ItemField::DeveloperName), Some("Acme Inc."));
        assert_eq!(
            text(&fields, ItemField::DeveloperWebsite),
            Some("https://acme.example.org/")
        );
        assert_eq!(text(&fields, ItemField::Rating), Some("4.8"));
        assert_eq!(text(&fields, ItemField::ReviewsCount), Some("1,234"));
        assert_eq!(text(&fields, ItemField::Price), Some("Free plan"));
        assert_eq!(fields.len(), ItemField::EXPECTED.len());
    }

    #[test]
    fn test_empty_page_has_no_fields() {
        assert!(extract_fields("<html><body></body></html>", None).is_empty());
        assert!(extract_fields("", None).is_empty());
    }

    #[test]
    fn test_og_description_fallback() {
        let html = r#"<head><meta property="og:description" content="From OG"></head>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::ShortDescription), Some("From OG"));
    }

    #[test]
    fn test_full_description_falls_back_to_main_paragraph() {
        let html = r#"<main><p>  </p><p>First real paragraph</p><p>Second</p></main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(
            text(&fields, ItemField::FullDescription),
            Some("First real paragraph")
        );
    }

    #[test]
    fn test_developer_without_link() {
        let html = r#"<dl><dt>Developer</dt><dd>  Solo Dev  </dd></dl>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::DeveloperName), Some("Solo Dev"));
        assert!(fields.get(&ItemField::DeveloperWebsite).is_none());
    }

    #[test]
    fn test_relative_developer_website_is_resolved() {
        let html = r#"<dl><dt>Developer</dt><dd><a href="/partners/acme">Acme</a></dd></dl>"#;
        let page = Url::parse("https://apps.example.com/acme").unwrap();
        let fields = extract_fields(html, Some(&page));
        assert_eq!(
            text(&fields, ItemField::DeveloperWebsite),
            Some("https://apps.example.com/partners/acme")
        );
    }

    #[test]
    fn test_json_ld_rating() {
        let html = r#"
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [
                {"@type": "SoftwareApplication", "name": "Acme",
                 "aggregateRating": {"ratingValue": 4.6, "reviewCount": "873"}}
            ]}
            </script>
        "#;
        let fields = extract_fields(html, None);
        assert_eq!(fields.get(&ItemField::Rating), Some(&FieldValue::Number(4.6)));
        assert_eq!(text(&fields, ItemField::ReviewsCount), Some("873"));
    }

    #[test]
    fn test_malformed_json_ld_is_ignored() {
        let html = r#"<script type="application/ld+json">{ not json</script><main>3.9 (12)</main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::Rating), Some("3.9"));
        assert_eq!(text(&fields, ItemField::ReviewsCount), Some("12"));
    }

    #[test]
    fn test_reviews_phrase_with_suffix() {
        let html = r#"<main><p>Loved by merchants: 1.2k reviews</p></main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::ReviewsCount), Some("1.2k"));
        assert!(fields.get(&ItemField::Rating).is_none());
    }

    #[test]
    fn test_recurring_price() {
        let html = r#"<main><p>From $19.99 / month after trial. Also $5 add-ons.</p></main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::Price), Some("From $19.99 / month"));
    }

    #[test]
    fn test_plain_price() {
        let html = r#"<main><p>One-time charge of $49</p></main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::Price), Some("$49"));
    }

    #[test]
    fn test_free_to_install_wins() {
        let html = r#"<main><p>$10/month</p><p>Free to install</p></main>"#;
        let fields = extract_fields(html, None);
        assert_eq!(text(&fields, ItemField::Price), Some("Free to install"));
    }

    fn stub(url: &str) -> ItemStub {
        ItemStub {
            source_url: url.to_string(),
            category_id: 1,
            discovery_order: 0,
            link_text: None,
        }
    }

    #[tokio::test]
    async fn test_extract_ok() {
        let url = "https://apps.example.com/acme";
        let fetcher = Arc::new(ScriptedFetcher::new().page(url, COMPLETE_PAGE));
        let extractor = ItemExtractor::new(fetcher, fast_retry(), CancellationToken::new());

        let raw = extractor.extract(stub(url)).await;

        assert_eq!(raw.fetch_status, FetchStatus::Ok);
        assert_eq!(raw.stub.source_url, url);
    }

    #[tokio::test]
    async fn test_extract_missing_developer_website_is_partial() {
        let url = "https://apps.example.com/acme";
        let page = COMPLETE_PAGE.replace(
            r#"<a href="https://acme.example.org/">Acme Inc.</a>"#,
            "Acme Inc.",
        );
        let fetcher = Arc::new(ScriptedFetcher::new().page(url, page));
        let extractor = ItemExtractor::new(fetcher, fast_retry(), CancellationToken::new());

        let raw = extractor.extract(stub(url)).await;

        assert_eq!(raw.fetch_status, FetchStatus::Partial);
        assert_eq!(raw.missing_fields(), vec![ItemField::DeveloperWebsite]);
        assert_eq!(
            raw.get(ItemField::DeveloperName),
            Some(&FieldValue::from("Acme Inc."))
        );
    }

    #[tokio::test]
    async fn test_extract_fetch_failure() {
        let url = "https://apps.example.com/gone";
        let fetcher = Arc::new(ScriptedFetcher::new().transient(url));
        let extractor = ItemExtractor::new(fetcher.clone(), fast_retry(), CancellationToken::new());

        let raw = extractor.extract(stub(url)).await;

        assert_eq!(raw.fetch_status, FetchStatus::Failed);
        assert!(raw.fields.is_empty());
        assert_eq!(fetcher.call_count(url), 3);
    }
}
