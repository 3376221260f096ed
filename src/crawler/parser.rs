//! Listing page parser
//!
//! This module reads a category listing page and extracts:
//! - Links to item detail pages, in page order
//! - The link to the next listing page, if the page declares one

use crate::url::CatalogSite;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// An item link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    /// Absolute detail page URL, rebuilt from the item slug
    pub url: String,

    /// Visible anchor text, if it looks like a name
    pub text: Option<String>,
}

/// Extracted information from a listing page
#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    /// Item links in the order they appear, without in-page repeats
    pub items: Vec<ListingLink>,

    /// Absolute URL of the next listing page
    pub next_page: Option<String>,
}

/// Parses a listing page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags whose target is an item page of `site`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Links into reserved sections (categories, pricing, blog, ...)
/// - Links to other hosts
///
/// The next page comes from `<link rel="next">` or `<a rel="next">`.
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::parse_listing;
/// use catalog_harvest::url::CatalogSite;
/// use url::Url;
///
/// let site = CatalogSite::new("https://apps.example.com", &[]).unwrap();
/// let page = Url::parse("https://apps.example.com/categories/sales").unwrap();
/// let html = r#"<a href="/acme?surface=category">Acme</a><a rel="next" href="?page=2">Next</a>"#;
///
/// let parsed = parse_listing(html, &page, &site);
/// assert_eq!(parsed.items[0].url, "https://apps.example.com/acme");
/// assert_eq!(
///     parsed.next_page.as_deref(),
///     Some("https://apps.example.com/categories/sales?page=2")
/// );
/// ```
pub fn parse_listing(html: &str, page_url: &Url, site: &CatalogSite) -> ParsedListing {
    let document = Html::parse_document(html);

    ParsedListing {
        items: extract_item_links(&document, page_url, site),
        next_page: extract_next_page(&document, page_url),
    }
}

/// Extracts item links in document order
fn extract_item_links(document: &Html, page_url: &Url, site: &CatalogSite) -> Vec<ListingLink> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return items;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }
        if has_rel(&element, "next") || has_rel(&element, "prev") {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_link(href, page_url) else {
            continue;
        };
        let Ok(parsed) = Url::parse(&absolute) else {
            continue;
        };
        let Some(slug) = site.item_slug(&parsed) else {
            continue;
        };
        let Ok(item_url) = site.item_url(&slug) else {
            continue;
        };

        if !seen.insert(item_url.clone()) {
            continue;
        }

        items.push(ListingLink {
            url: item_url,
            text: anchor_text(&element),
        });
    }

    items
}

/// Finds the declared next listing page
fn extract_next_page(document: &Html, page_url: &Url) -> Option<String> {
    for selector in ["link[rel~='next'][href]", "a[rel~='next'][href]"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        let next = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .find_map(|href| resolve_link(href, page_url));

        if next.is_some() {
            return next;
        }
    }

    None
}

fn has_rel(element: &ElementRef, value: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case(value)))
        .unwrap_or(false)
}

/// Collapsed anchor text; one-character labels are treated as absent
fn anchor_text(element: &ElementRef) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() < 2 {
        None
    } else {
        Some(text)
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Same page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
