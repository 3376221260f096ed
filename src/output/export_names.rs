//! File names for tabular exports
//!
//! Every export of a run shares one timestamp. The combined file is
//! `catalog_<timestamp>.<ext>`, per-category files are
//! `catalog_<category>_<timestamp>.<ext>`.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Timestamp format used in export file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Turns a category name into a file name fragment
///
/// Lowercase ASCII alphanumerics are kept, every other run of characters
/// becomes a single underscore.
pub fn category_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "category".to_string()
    } else {
        slug
    }
}

/// Allocates export file names for one run
///
/// Each distinct category name gets its own fragment. Names that slug to the
/// same text are told apart by a numeric suffix (`sales`, `sales_2`, ...), in
/// the order the categories are first seen.
#[derive(Debug, Clone)]
pub struct ExportNames {
    timestamp: String,
    fragments: HashMap<String, String>,
    taken: HashSet<String>,
}

impl ExportNames {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.format(FILE_TIMESTAMP_FORMAT).to_string(),
            fragments: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    /// Name of the file holding every record of the run
    pub fn combined(&self, extension: &str) -> String {
        format!("catalog_{}.{}", self.timestamp, extension)
    }

    /// Name of the file holding the records of `category`
    pub fn category(&mut self, category: &str, extension: &str) -> String {
        let fragment = self.fragment(category);
        format!("catalog_{}_{}.{}", fragment, self.timestamp, extension)
    }

    fn fragment(&mut self, category: &str) -> String {
        if let Some(fragment) = self.fragments.get(category) {
            return fragment.clone();
        }

        let base = category_slug(category);
        let mut fragment = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(fragment.clone()) {
            fragment = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        self.fragments.insert(category.to_string(), fragment.clone());
        fragment
    }
}
