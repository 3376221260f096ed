use crate::UrlError;
use url::Url;

/// First path segments under the catalog root that are never item pages
pub const DEFAULT_RESERVED_PATHS: &[&str] = &[
    "categories",
    "collections",
    "pricing",
    "blog",
    "partners",
    "search",
    "stories",
    "login",
    "sitemap",
];

/// Knows which URLs under the catalog root point at item detail pages
///
/// Item pages live directly below the catalog root (`<root>/<slug>`); anything
/// whose first segment is reserved (category listings, blog, ...) is not an item.
#[derive(Debug, Clone)]
pub struct CatalogSite {
    base: Url,
    reserved_paths: Vec<String>,
}

impl CatalogSite {
    /// Creates a catalog site rooted at `base_url`
    pub fn new(base_url: &str, reserved_paths: &[String]) -> Result<Self, UrlError> {
        let mut base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(base.scheme().to_string()));
        }
        if base.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let reserved_paths = if reserved_paths.is_empty() {
            DEFAULT_RESERVED_PATHS.iter().map(|s| s.to_string()).collect()
        } else {
            reserved_paths.iter().map(|s| s.to_lowercase()).collect()
        };

        Ok(Self {
            base,
            reserved_paths,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns the item slug if `url` is an item detail page of this catalog
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_harvest::url::CatalogSite;
    /// use url::Url;
    ///
    /// let site = CatalogSite::new("https://apps.example.com", &[]).unwrap();
    /// let item = Url::parse("https://apps.example.com/acme-reviews?surface=home").unwrap();
    /// let listing = Url::parse("https://apps.example.com/categories/sales").unwrap();
    ///
    /// assert_eq!(site.item_slug(&item), Some("acme-reviews".to_string()));
    /// assert_eq!(site.item_slug(&listing), None);
    /// ```
    pub fn item_slug(&self, url: &Url) -> Option<String> {
        if url.scheme() != self.base.scheme()
            || url.host_str() != self.base.host_str()
            || url.port_or_known_default() != self.base.port_or_known_default()
        {
            return None;
        }

        let rest = url.path().strip_prefix(self.base.path())?;
        let slug = rest.split('/').next()?.trim();

        if slug.is_empty() || self.reserved_paths.iter().any(|r| r == &slug.to_lowercase()) {
            return None;
        }

        Some(slug.to_string())
    }

    /// Builds the canonical detail page URL for a slug
    pub fn item_url(&self, slug: &str) -> Result<String, UrlError> {
        self.base
            .join(slug)
            .map(|u| u.to_string())
            .map_err(|e| UrlError::Parse(e.to_string()))
    }
}

/// Turns a URL slug into a display name (`acme-reviews` → `Acme Reviews`)
pub fn slug_to_title(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the last non-empty path segment of a URL string
pub fn last_path_segment(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CatalogSite {
        CatalogSite::new("https://apps.example.com", &[]).unwrap()
    }

    #[test]
    fn test_item_slug() {
        let url = Url::parse("https://apps.example.com/acme").unwrap();
        assert_eq!(site().item_slug(&url), Some("acme".to_string()));
    }

    #[test]
    fn test_item_slug_ignores_deeper_segments() {
        let url = Url::parse("https://apps.example.com/acme/reviews?page=2").unwrap();
        assert_eq!(site().item_slug(&url), Some("acme".to_string()));
    }

    #[test]
    fn test_reserved_paths_are_not_items() {
        for path in ["categories/sales", "pricing", "blog/post", "partners"] {
            let url = Url::parse(&format!("https://apps.example.com/{}", path)).unwrap();
            assert_eq!(site().item_slug(&url), None, "{} should be reserved", path);
        }
    }

    #[test]
    fn test_other_host_is_not_item() {
        let url = Url::parse("https://other.example.com/acme").unwrap();
        assert_eq!(site().item_slug(&url), None);
    }

    #[test]
    fn test_root_is_not_item() {
        let url = Url::parse("https://apps.example.com/").unwrap();
        assert_eq!(site().item_slug(&url), None);
    }

    #[test]
    fn test_base_with_path_prefix() {
        let site = CatalogSite::new("http://127.0.0.1:9000/store", &[]).unwrap();
        let item = Url::parse("http://127.0.0.1:9000/store/acme").unwrap();
        let outside = Url::parse("http://127.0.0.1:9000/acme").unwrap();

        assert_eq!(site.item_slug(&item), Some("acme".to_string()));
        assert_eq!(site.item_slug(&outside), None);
        assert_eq!(
            site.item_url("acme").unwrap(),
            "http://127.0.0.1:9000/store/acme"
        );
    }

    #[test]
    fn test_custom_reserved_paths() {
        let site = CatalogSite::new("https://apps.example.com", &["Apps".to_string()]).unwrap();
        let url = Url::parse("https://apps.example.com/apps").unwrap();
        let categories = Url::parse("https://apps.example.com/categories").unwrap();

        assert_eq!(site.item_slug(&url), None);
        assert_eq!(site.item_slug(&categories), Some("categories".to_string()));
    }

    #[test]
    fn test_invalid_base() {
        assert!(CatalogSite::new("ftp://apps.example.com", &[]).is_err());
        assert!(CatalogSite::new("not a url", &[]).is_err());
    }

    #[test]
    fn test_slug_to_title() {
        assert_eq!(slug_to_title("acme-reviews"), "Acme Reviews");
        assert_eq!(slug_to_title("seo_booster--pro"), "Seo Booster Pro");
        assert_eq!(slug_to_title(""), "");
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(
            last_path_segment("https://apps.example.com/acme/"),
            Some("acme".to_string())
        );
        assert_eq!(last_path_segment("https://apps.example.com/"), None);
    }
}
