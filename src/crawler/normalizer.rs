//! Raw record normalization
//!
//! Maps scraped values onto the canonical schema. Values that cannot be
//! represented faithfully are dropped rather than clamped or truncated.

use crate::models::{CanonicalRecord, FieldValue, ItemField, RawRecord};
use crate::url::{identity_key, last_path_segment, slug_to_title};
use chrono::Utc;

/// Default value of `reviews_source`
pub const DEFAULT_REVIEWS_SOURCE: &str = "shopify_app_store";

/// Turns raw records into canonical rows
#[derive(Debug, Clone)]
pub struct Normalizer {
    reviews_source: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_REVIEWS_SOURCE)
    }
}

impl Normalizer {
    pub fn new(reviews_source: impl Into<String>) -> Self {
        Self {
            reviews_source: reviews_source.into(),
        }
    }

    /// Normalizes a raw record into a canonical one
    ///
    /// # Returns
    ///
    /// * `Some(CanonicalRecord)` - for `Ok` and `Partial` records
    /// * `None` - for `Failed` records and items whose URL cannot be canonicalized
    pub fn normalize(&self, raw: &RawRecord, category_name: &str) -> Option<CanonicalRecord> {
        if raw.fetch_status.is_failed() {
            return None;
        }

        let key = match identity_key(&raw.stub.source_url) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Dropping {}: {}", raw.stub.source_url, e);
                return None;
            }
        };

        let app_name = self
            .text(raw, ItemField::AppName)
            .or_else(|| raw.stub.link_text.as_deref().and_then(clean_text))
            .or_else(|| {
                last_path_segment(&key)
                    .map(|slug| slug_to_title(&slug))
                    .filter(|title| !title.is_empty())
            })
            .unwrap_or_else(|| key.clone());

        Some(CanonicalRecord {
            category: category_name.to_string(),
            identity_key: key.clone(),
            app_name,
            app_url: key,
            short_description: self.text(raw, ItemField::ShortDescription),
            full_description: self.text(raw, ItemField::FullDescription),
            developer_name: self.text(raw, ItemField::DeveloperName),
            developer_website: self.text(raw, ItemField::DeveloperWebsite),
            price: self.text(raw, ItemField::Price),
            rating: raw.get(ItemField::Rating).and_then(parse_rating),
            reviews_count: raw.get(ItemField::ReviewsCount).and_then(parse_count),
            reviews_source: self.reviews_source.clone(),
            scraped_at: Utc::now(),
        })
    }

    fn text(&self, raw: &RawRecord, field: ItemField) -> Option<String> {
        match raw.get(field)? {
            FieldValue::Text(s) => clean_text(s),
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// Trims a string; blank strings become absent
fn clean_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a star rating in [0.0, 5.0]
///
/// A comma decimal separator is accepted (`4,7`). Out-of-range and non-finite
/// values are absent.
pub fn parse_rating(value: &FieldValue) -> Option<f64> {
    let rating = match value {
        FieldValue::Number(n) => *n,
        FieldValue::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
    };

    if rating.is_finite() && (0.0..=5.0).contains(&rating) {
        Some(rating)
    } else {
        None
    }
}

/// Parses a review count into an exact non-negative integer
///
/// Thousands separators are dropped and `k`/`M` suffixes expanded (`1.2k` → 1200).
/// Anything that would need rounding (`12.5`, `1.2345k`) is absent.
pub fn parse_count(value: &FieldValue) -> Option<u64> {
    match value {
        FieldValue::Number(n) => {
            if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n < u64::MAX as f64 {
                Some(*n as u64)
            } else {
                None
            }
        }
        FieldValue::Text(s) => parse_count_text(s),
    }
}

fn parse_count_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>()
        .to_lowercase();

    let (number, multiplier) = match cleaned.strip_suffix('k') {
        Some(rest) => (rest, 1_000u64),
        None => match cleaned.strip_suffix('m') {
            Some(rest) => (rest, 1_000_000u64),
            None => (cleaned.as_str(), 1u64),
        },
    };

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let int: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut count = int.checked_mul(multiplier)?;

    if !frac_part.is_empty() {
        let scale = 10u64.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
        let scaled = frac_part.parse::<u64>().ok()?.checked_mul(multiplier)?;
        if scaled % scale != 0 {
            return None;
        }
        count = count.checked_add(scaled / scale)?;
    }

    Some(count)
}
