//! Listing page navigation and detail link harvesting
//!
//! A listing page is rendered through the shared browser session, then its
//! anchors are matched against an ordered list of structural selectors. The
//! first selector that yields at least one detail link wins; when none does,
//! every anchor is scanned for an item-shaped path.

use crate::config::Config;
use crate::session::{BrowserSession, RenderWait, SessionError, SessionResult};
use crate::url::{dedupe_preserving_order, listing_url, normalize_detail_url, resolve_link};
use crate::ConfigError;
use scraper::{Html, Selector};
use url::Url;

/// Anchor selectors for CONTENTdm search results, most specific first
pub const LINK_SELECTORS: &[&str] = &[
    "a[href*='/digital/collection/']",
    "a[href*='/collection/']",
    "[data-testid='search-result'] a",
    ".search-result a",
    "[class*='search-result'] a",
    "[class*='item-link'] a",
];

/// Path fragments that identify a detail page link
pub const DETAIL_PATH_MARKERS: &[&str] = &["/digital/collection/", "/collection/"];

/// One harvested listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub page_number: u32,
    /// Detail URLs in discovery order, without duplicates
    pub urls: Vec<Url>,
}

impl CatalogPage {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Loads listing pages and extracts detail links from them
#[derive(Debug, Clone)]
pub struct PageNavigator {
    base_url: Url,
    listing_path: String,
    wait: RenderWait,
    selectors: Vec<Selector>,
    any_anchor: Selector,
}

impl PageNavigator {
    pub fn new(base_url: Url, listing_path: impl Into<String>, wait: RenderWait) -> Self {
        let selectors = LINK_SELECTORS
            .iter()
            .filter_map(|selector| Selector::parse(selector).ok())
            .collect();
        let any_anchor = Selector::parse("a[href]").expect("valid selector");
        Self {
            base_url,
            listing_path: listing_path.into(),
            wait,
            selectors,
            any_anchor,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e)))?;
        let wait = RenderWait::new(
            config.site.render_marker.as_str(),
            config.browser.render_timeout(),
            config.browser.listing_settle(),
        );
        Ok(Self::new(base_url, config.site.listing_path.as_str(), wait))
    }

    /// URL of the listing page with the given number
    pub fn page_url(&self, page: u32) -> Result<Url, url::ParseError> {
        listing_url(&self.base_url, &self.listing_path, page)
    }

    /// Renders listing page `page` and harvests its detail links
    ///
    /// A render timeout yields an empty page rather than an error; both are
    /// retried by the caller.
    pub async fn load_page(
        &self,
        session: &dyn BrowserSession,
        page: u32,
    ) -> SessionResult<CatalogPage> {
        let url = self.page_url(page).map_err(|e| SessionError::Navigation {
            url: format!("{}{}", self.base_url, self.listing_path),
            message: e.to_string(),
        })?;
        tracing::debug!("Loading listing page {} ({})", page, url);

        let source = match session.render(&url, &self.wait).await {
            Ok(source) => source,
            Err(e) if e.is_render_timeout() => {
                tracing::warn!("Listing page {} did not render: {}", page, e);
                return Ok(CatalogPage {
                    page_number: page,
                    urls: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };

        let urls = self.harvest_links(&source, &url);
        tracing::info!("Page {}: found {} entries", page, urls.len());
        Ok(CatalogPage {
            page_number: page,
            urls,
        })
    }

    /// Detail links found in rendered listing source, resolved against `page_url`
    pub fn harvest_links(&self, source: &str, page_url: &Url) -> Vec<Url> {
        let document = Html::parse_document(source);

        for selector in &self.selectors {
            let links: Vec<Url> = document
                .select(selector)
                .filter_map(|anchor| anchor.value().attr("href"))
                .filter(|href| DETAIL_PATH_MARKERS.iter().any(|marker| href.contains(marker)))
                .filter_map(|href| resolve_link(href, page_url))
                .map(normalize_detail_url)
                .collect();
            if !links.is_empty() {
                return dedupe_preserving_order(links);
            }
        }

        let fallback: Vec<Url> = document
            .select(&self.any_anchor)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| is_item_path(href))
            .filter_map(|href| resolve_link(href, page_url))
            .map(normalize_detail_url)
            .collect();
        if !fallback.is_empty() {
            tracing::debug!("Structural selectors found nothing, used anchor scan");
        }
        dedupe_preserving_order(fallback)
    }
}

fn is_item_path(href: &str) -> bool {
    href.contains("/id/") && (href.contains("collection") || href.contains("digital"))
}
