//! URL handling module for Catalog-Harvest
//!
//! This module provides URL canonicalization (the identity key used for
//! deduplication) and the catalog site model that tells item pages apart from
//! listing and marketing pages.

mod catalog;
mod normalize;

// Re-export main functions
pub use catalog::{last_path_segment, slug_to_title, CatalogSite, DEFAULT_RESERVED_PATHS};
pub use normalize::{canonicalize_url, identity_key};
