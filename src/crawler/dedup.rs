//! Run-wide item deduplication

use crate::models::{ItemStub, RawRecord};
use crate::url::identity_key;
use std::collections::HashSet;
use std::sync::Mutex;

/// Guarantees each logical item is accepted at most once per run
///
/// Keyed by the identity key of the item URL, so the same app reached through
/// different categories, trailing slashes or tracking queries is accepted once.
/// Items are claimed in discovery order, before their detail page is fetched;
/// a claim whose extraction fails is released again. The set is the only state
/// shared between extraction workers.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a record the first time its item is seen
    ///
    /// Failed records are never registered, so a later successful extraction of
    /// the same item can still be accepted. Returns false for URLs that cannot
    /// be canonicalized.
    pub fn accept(&self, record: &RawRecord) -> bool {
        if record.fetch_status.is_failed() {
            return false;
        }
        self.accept_url(&record.stub.source_url)
    }

    /// Claims a discovered item for its category
    ///
    /// Returns false if an earlier sighting already holds the item, or if its
    /// URL cannot be canonicalized.
    pub fn claim(&self, stub: &ItemStub) -> bool {
        self.accept_url(&stub.source_url)
    }

    /// Gives up the claim on an item so a later sighting can take it
    pub fn release(&self, url: &str) {
        let Ok(key) = identity_key(url) else {
            return;
        };

        let removed = match self.seen.lock() {
            Ok(mut seen) => seen.remove(&key),
            Err(poisoned) => poisoned.into_inner().remove(&key),
        };
        if removed {
            tracing::debug!("Released claim on {}", key);
        }
    }

    /// Registers an item URL, returning true if it was not known yet
    pub fn accept_url(&self, url: &str) -> bool {
        let Ok(key) = identity_key(url) else {
            tracing::debug!("Rejecting item with unusable URL: {}", url);
            return false;
        };

        match self.seen.lock() {
            Ok(mut seen) => seen.insert(key),
            Err(poisoned) => poisoned.into_inner().insert(key),
        }
    }

    /// Returns true if an item with this URL was already accepted
    pub fn is_known(&self, url: &str) -> bool {
        let Ok(key) = identity_key(url) else {
            return false;
        };

        match self.seen.lock() {
            Ok(seen) => seen.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        }
    }

    /// Number of distinct items accepted so far
    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, ItemField, ItemStub};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn record(url: &str, category_id: u32) -> RawRecord {
        let stub = ItemStub {
            source_url: url.to_string(),
            category_id,
            discovery_order: 0,
            link_text: None,
        };
        let mut fields = BTreeMap::new();
        fields.insert(ItemField::AppName, FieldValue::from("Acme"));
        RawRecord::from_fields(stub, fields)
    }

    #[test]
    fn test_first_sighting_wins() {
        let dedup = Deduplicator::new();
        assert!(dedup.accept(&record("https://apps.example.com/acme", 1)));
        assert!(!dedup.accept(&record("https://apps.example.com/acme", 2)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_trailing_slash_and_query_are_same_item() {
        let dedup = Deduplicator::new();
        assert!(dedup.accept(&record("https://apps.example.com/acme", 1)));
        assert!(!dedup.accept(&record("https://apps.example.com/acme/", 1)));
        assert!(!dedup.accept(&record("https://apps.example.com/acme?surface=search", 1)));
        assert!(!dedup.accept(&record("HTTPS://APPS.example.com/acme#reviews", 1)));
    }

    #[test]
    fn test_failed_records_are_not_registered() {
        let dedup = Deduplicator::new();
        let failed = RawRecord::failed(record("https://apps.example.com/acme", 1).stub);

        assert!(!dedup.accept(&failed));
        assert!(!dedup.is_known("https://apps.example.com/acme"));
        assert!(dedup.accept(&record("https://apps.example.com/acme", 2)));
    }

    #[test]
    fn test_claim_in_discovery_order() {
        let dedup = Deduplicator::new();
        let first = record("https://apps.example.com/acme", 1).stub;
        let second = record("https://apps.example.com/acme/", 2).stub;

        assert!(dedup.claim(&first));
        assert!(!dedup.claim(&second));
        assert!(dedup.is_known("https://apps.example.com/acme"));
    }

    #[test]
    fn test_released_claim_can_be_taken_again() {
        let dedup = Deduplicator::new();
        let first = record("https://apps.example.com/acme", 1).stub;
        let later = record("https://apps.example.com/acme?ref=search", 2).stub;

        assert!(dedup.claim(&first));
        dedup.release(&first.source_url);
        assert!(!dedup.is_known("https://apps.example.com/acme"));
        assert!(dedup.claim(&later));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let dedup = Deduplicator::new();
        assert!(!dedup.accept(&record("not a url", 1)));
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_is_known() {
        let dedup = Deduplicator::new();
        assert!(!dedup.is_known("https://apps.example.com/acme"));
        dedup.accept_url("https://apps.example.com/acme/");
        assert!(dedup.is_known("https://apps.example.com/acme"));
    }

    #[tokio::test]
    async fn test_concurrent_accept_is_atomic() {
        let dedup = Arc::new(Deduplicator::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let dedup = dedup.clone();
            handles.push(tokio::spawn(async move {
                let mut accepted = 0;
                for i in 0..50 {
                    let url = format!("https://apps.example.com/app-{}", i);
                    if dedup.accept(&record(&url, worker)) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        assert_eq!(total, 50);
        assert_eq!(dedup.len(), 50);
    }
}
