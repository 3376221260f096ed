use crate::UrlError;
use url::Url;

/// Canonicalizes a URL for identity comparison
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not HTTP or HTTPS
/// 3. Lowercase the scheme and host (done by the parser)
/// 4. Remove trailing slashes (except for root /)
/// 5. Remove fragment
/// 6. Remove the whole query string
///
/// The rest of the path is kept as the parser leaves it, so `/a//b` and
/// `/a/b` stay different items.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::canonicalize_url;
///
/// let url = canonicalize_url("HTTPS://Apps.Example.COM/acme/?ref=home#reviews").unwrap();
/// assert_eq!(url.as_str(), "https://apps.example.com/acme");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    let path = strip_trailing_slashes(url.path()).to_string();
    url.set_path(&path);
    url.set_fragment(None);
    url.set_query(None);

    Ok(url)
}

/// Derives the deduplication identity of an item from its URL
///
/// This is the canonical URL with the root slash dropped as well, so
/// `https://a.com/` and `https://a.com` share one identity.
///
/// # Examples
///
/// ```
/// use catalog_harvest::url::identity_key;
///
/// assert_eq!(
///     identity_key("https://apps.example.com/acme/").unwrap(),
///     identity_key("https://apps.example.com/acme?surface=search").unwrap(),
/// );
/// ```
pub fn identity_key(url_str: &str) -> Result<String, UrlError> {
    let url = canonicalize_url(url_str)?;
    let host = url.host_str().ok_or(UrlError::MissingHost)?;

    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = if url.path() == "/" { "" } else { url.path() };

    Ok(format!("{}://{}{}{}", url.scheme(), host, port, path))
}

/// Removes trailing slashes from a path, keeping the root
fn strip_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
