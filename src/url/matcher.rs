use url::Url;

/// Checks if a page URL looks like a product page
///
/// The URL's path (with a trailing slash appended, so `/p/123` and `/shop/`
/// style roots both match) is checked for any of the allow-listed substrings.
/// URLs that fail to parse are checked as raw text.
///
/// # Arguments
///
/// * `url` - The page URL from a leaf sitemap
/// * `allow_list` - Path substrings such as `/products/` or `/p/`
///
/// # Examples
///
/// ```
/// use shelf_sweep::url::is_product_url;
///
/// let allow = vec!["/products/".to_string(), "/p/".to_string()];
/// assert!(is_product_url("https://shop.com/products/mug", &allow));
/// assert!(is_product_url("https://shop.com/p/123", &allow));
/// assert!(!is_product_url("https://shop.com/pages/about", &allow));
/// ```
pub fn is_product_url(url: &str, allow_list: &[String]) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => format!("{}/", parsed.path().trim_end_matches('/')),
        Err(_) => url.to_string(),
    };

    allow_list
        .iter()
        .any(|segment| path.contains(segment.as_str()))
}

/// Applies the optional product filter and the per-sitemap cap, preserving order
///
/// * `filter` - `None` keeps every URL
/// * `cap` - `0` means unbounded
pub fn select_product_urls(urls: Vec<String>, filter: Option<&[String]>, cap: usize) -> Vec<String> {
    let limit = if cap == 0 { usize::MAX } else { cap };

    urls.into_iter()
        .filter(|u| filter.map_or(true, |allow| is_product_url(u, allow)))
        .take(limit)
        .collect()
}
