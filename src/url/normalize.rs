use url::Url;

/// Query parameters that never identify a catalog item
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

/// Resolves an href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute)
        }
        _ => None,
    }
}

/// Normalizes a detail page URL so the same item always maps to one string
///
/// # Normalization Steps
///
/// 1. Remove the fragment
/// 2. Remove a trailing slash (except for the root path)
/// 3. Drop tracking query parameters, removing the query if nothing is left
///
/// # Examples
///
/// ```
/// use catalog_harvester::url::normalize_detail_url;
/// use url::Url;
///
/// let url = Url::parse("https://site/digital/collection/p1/id/5/?utm_source=x#top").unwrap();
/// assert_eq!(
///     normalize_detail_url(url).as_str(),
///     "https://site/digital/collection/p1/id/5"
/// );
/// ```
pub fn normalize_detail_url(mut url: Url) -> Url {
    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url
}
