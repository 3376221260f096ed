//! Record types flowing through the harvest pipeline
//!
//! `CategoryJob` → `ItemStub` → `RawRecord` → `CanonicalRecord`, in that order.

use crate::state::FetchStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One category to traverse, with its item cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryJob {
    pub category_id: u32,
    pub category_name: String,
    pub target_item_count: usize,
    /// First listing page (or page template containing `{page}`)
    pub listing_url: String,
}

/// Locates an item detail page discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStub {
    pub source_url: String,
    pub category_id: u32,
    /// Position in the category's traversal, starting at 0
    pub discovery_order: usize,
    /// Anchor text on the listing, used only as a name fallback
    pub link_text: Option<String>,
}

/// Fields the extractor looks for on a detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemField {
    AppName,
    ShortDescription,
    FullDescription,
    DeveloperName,
    DeveloperWebsite,
    Price,
    Rating,
    ReviewsCount,
}

impl ItemField {
    /// Every field a complete detail page yields
    pub const EXPECTED: [ItemField; 8] = [
        ItemField::AppName,
        ItemField::ShortDescription,
        ItemField::FullDescription,
        ItemField::DeveloperName,
        ItemField::DeveloperWebsite,
        ItemField::Price,
        ItemField::Rating,
        ItemField::ReviewsCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppName => "app_name",
            Self::ShortDescription => "short_description",
            Self::FullDescription => "full_description",
            Self::DeveloperName => "developer_name",
            Self::DeveloperWebsite => "developer_website",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::ReviewsCount => "reviews_count",
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value as it was scraped, before type coercion
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Output of the item extractor; absent fields are simply missing from `fields`
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub stub: ItemStub,
    pub fields: BTreeMap<ItemField, FieldValue>,
    pub fetch_status: FetchStatus,
}

impl RawRecord {
    /// Record for an item whose detail page could not be fetched
    pub fn failed(stub: ItemStub) -> Self {
        Self {
            stub,
            fields: BTreeMap::new(),
            fetch_status: FetchStatus::Failed,
        }
    }

    /// Builds a record from extracted fields, deriving the fetch status
    pub fn from_fields(stub: ItemStub, fields: BTreeMap<ItemField, FieldValue>) -> Self {
        let complete = ItemField::EXPECTED.iter().all(|f| fields.contains_key(f));
        let fetch_status = if complete {
            FetchStatus::Ok
        } else {
            FetchStatus::Partial
        };
        Self {
            stub,
            fields,
            fetch_status,
        }
    }

    pub fn get(&self, field: ItemField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Expected fields that were not found on the page
    pub fn missing_fields(&self) -> Vec<ItemField> {
        ItemField::EXPECTED
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(f))
            .collect()
    }
}

/// A normalized, schema-conformant catalog row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub category: String,
    pub identity_key: String,
    pub app_name: String,
    pub app_url: String,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub developer_name: Option<String>,
    pub developer_website: Option<String>,
    pub price: Option<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<u64>,
    pub reviews_source: String,
    pub scraped_at: DateTime<Utc>,
}
