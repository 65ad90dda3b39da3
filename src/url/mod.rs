//! URL handling module
//!
//! This module provides listing URL templating, link resolution against a
//! base page, detail URL normalization, and order-preserving deduplication.

mod normalize;

pub use normalize::{normalize_detail_url, resolve_link};

use std::collections::HashSet;
use url::Url;

/// Placeholder replaced by the page number in listing path templates
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Builds the URL of one catalog listing page
///
/// # Arguments
///
/// * `base` - The catalog base URL
/// * `template` - Listing path template containing `{page}`
/// * `page` - The 1-based page number
///
/// # Examples
///
/// ```
/// use catalog_harvester::url::listing_url;
/// use url::Url;
///
/// let base = Url::parse("https://digitalcollections.aucegypt.edu").unwrap();
/// let url = listing_url(&base, "/digital/search/page/{page}", 7).unwrap();
/// assert_eq!(url.as_str(), "https://digitalcollections.aucegypt.edu/digital/search/page/7");
/// ```
pub fn listing_url(base: &Url, template: &str, page: u32) -> Result<Url, url::ParseError> {
    base.join(&template.replace(PAGE_PLACEHOLDER, &page.to_string()))
}

/// Removes duplicate URLs while keeping the first-seen order
pub fn dedupe_preserving_order(urls: Vec<Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect()
}
