//! Main item image resolution

use crate::extract::document::DetailPage;
use scraper::{ElementRef, Selector};
use url::Url;

/// Selectors associated with item imagery, most specific first
pub const IMAGE_SELECTORS: &[&str] = &[
    "img[src*='iiif']",
    ".item-image img",
    ".main-image img",
    ".content img",
    "[class*='image'] img",
    "img[class*='file']",
    "img[src*='/digital/']",
    "img[src*='digitalcollections']",
];

/// Substrings marking decorative assets
const SKIP_MARKERS: &[&str] = &[
    "logo",
    "icon",
    "favicon",
    "button",
    "arrow",
    "bg_",
    "background",
    "sprite",
    "thumb_",
    "thumbnail",
    "avatar",
    "profile",
];

/// At least one of these must appear in an item image URL
const IMAGE_INDICATORS: &[&str] = &[
    "iiif", "digital", "collection", "item", "full", "image", ".jpg", ".jpeg", ".png", ".gif",
    ".webp", ".tiff",
];

/// Images with a declared dimension at or below this are skipped in the fallback scan
const MIN_FALLBACK_DIMENSION: u32 = 100;

/// Finds the main content image of a detail page
#[derive(Debug, Clone)]
pub struct ImageResolver {
    base_url: Url,
    selectors: Vec<Selector>,
    any_image: Selector,
}

impl ImageResolver {
    /// Resolver whose relative image URLs are joined onto `base_url`
    pub fn new(base_url: Url) -> Self {
        let selectors = IMAGE_SELECTORS
            .iter()
            .filter_map(|selector| Selector::parse(selector).ok())
            .collect();
        let any_image = Selector::parse("img[src]").expect("valid selector");
        Self {
            base_url,
            selectors,
            any_image,
        }
    }

    /// Absolute URL of the main image, if any candidate passes the filters
    pub fn resolve(&self, page: &DetailPage) -> Option<Url> {
        let document = page.document();

        for selector in &self.selectors {
            for img in document.select(selector) {
                if let Some(url) = self.candidate(img) {
                    return Some(url);
                }
            }
        }

        document
            .select(&self.any_image)
            .filter(|img| has_reasonable_size(*img))
            .find_map(|img| self.candidate(img))
    }

    fn candidate(&self, img: ElementRef<'_>) -> Option<Url> {
        let src = img.value().attr("src")?.trim();
        if src.is_empty() || !is_valid_image_url(src) {
            return None;
        }
        self.base_url.join(src).ok()
    }
}

/// Rejects decorative assets and requires an image-like marker
pub fn is_valid_image_url(src: &str) -> bool {
    let lowered = src.to_lowercase();
    if SKIP_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return false;
    }
    IMAGE_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

fn has_reasonable_size(img: ElementRef<'_>) -> bool {
    ["width", "height"]
        .iter()
        .all(|attr| match img.value().attr(attr) {
            None => true,
            Some(raw) => match raw.trim().trim_end_matches("px").trim().parse::<u32>() {
                Ok(size) => size > MIN_FALLBACK_DIMENSION,
                Err(_) => true,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(html: &str) -> Option<String> {
        let base = Url::parse("https://site").unwrap();
        let page = DetailPage::parse(&base.join("/digital/collection/p1/id/7").unwrap(), html);
        ImageResolver::new(base).resolve(&page).map(String::from)
    }

    #[test]
    fn test_relative_src_is_resolved_against_base() {
        let html = r#"<div class="item-image"><img src="/img.jpg"></div>"#;
        assert_eq!(resolve(html).as_deref(), Some("https://site/img.jpg"));
    }

    #[test]
    fn test_iiif_preferred_over_earlier_markup() {
        let html = r#"
            <div class="content"><img src="/content/photo.png"></div>
            <img src="https://site/iiif/2/p1:7/full/max/0/default.jpg">"#;
        assert_eq!(
            resolve(html).as_deref(),
            Some("https://site/iiif/2/p1:7/full/max/0/default.jpg")
        );
    }

    #[test]
    fn test_decorative_assets_are_skipped() {
        let html = r#"
            <div class="content"><img src="/static/logo.png"><img src="/static/thumbnail_7.jpg"></div>
            <div class="content"><img src="/media/plate.jpg"></div>"#;
        assert_eq!(resolve(html).as_deref(), Some("https://site/media/plate.jpg"));
    }

    #[test]
    fn test_fallback_respects_declared_size() {
        let html = r#"
            <img src="/a/small.jpg" width="40" height="40">
            <img src="/a/large.jpg" width="640px" height="480">"#;
        assert_eq!(resolve(html).as_deref(), Some("https://site/a/large.jpg"));
    }

    #[test]
    fn test_no_image() {
        assert!(resolve(r#"<img src="/static/spacer">"#).is_none());
    }

    #[test]
    fn test_is_valid_image_url() {
        assert!(is_valid_image_url("https://site/digital/api/singleitem/image/p1/7"));
        assert!(!is_valid_image_url("https://site/favicon.ico"));
        assert!(!is_valid_image_url("https://site/spacer"));
    }
}
