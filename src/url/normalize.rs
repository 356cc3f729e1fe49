use url::Url;

/// Normalizes an image reference found in product data
///
/// # Normalization Rules
///
/// 1. Empty input stays empty
/// 2. Protocol-relative (`//host/path`) becomes `https://host/path`
/// 3. Root-relative (`/path`) is resolved against the run's base URL
/// 4. Anything else passes through unchanged
///
/// # Examples
///
/// ```
/// use shelf_sweep::url::normalize_image_url;
/// use url::Url;
///
/// let base = Url::parse("https://site.com").unwrap();
/// assert_eq!(
///     normalize_image_url("//cdn.example.com/a.jpg", &base),
///     "https://cdn.example.com/a.jpg"
/// );
/// assert_eq!(normalize_image_url("/img/a.jpg", &base), "https://site.com/img/a.jpg");
/// ```
pub fn normalize_image_url(raw: &str, base: &Url) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return String::new();
    }

    if raw.starts_with("//") {
        return format!("https:{}", raw);
    }

    if raw.starts_with('/') {
        return match base.join(raw) {
            Ok(resolved) => resolved.to_string(),
            Err(e) => {
                tracing::debug!("Could not resolve image path {} against {}: {}", raw, base, e);
                raw.to_string()
            }
        };
    }

    raw.to_string()
}

/// Builds the per-variant URL: page URL without trailing slash plus `?variant=<id>`
pub fn variant_url(page_url: &str, variant_id: &str) -> String {
    format!("{}?variant={}", page_url.trim_end_matches('/'), variant_id)
}

/// URL of the structured JSON endpoint for a product page (`<page>.json`)
pub fn json_endpoint_url(page_url: &str) -> String {
    format!("{}.json", page_url.trim_end_matches('/'))
}

/// Derives a product handle from the last non-empty path segment of a page URL
///
/// Used when the source does not supply a handle of its own.
pub fn handle_from_url(page_url: &str) -> String {
    let path = match Url::parse(page_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => page_url.split(['?', '#']).next().unwrap_or("").to_string(),
    };

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}
