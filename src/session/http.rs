//! HTTP-backed browser session
//!
//! Fetches the server-rendered source of each page with reqwest. The render
//! marker is checked in the returned document; a missing marker is reported
//! the same way a headless browser reports a marker that never appeared.

use crate::config::BrowserConfig;
use crate::session::{BrowserSession, RenderWait, SessionError, SessionResult};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with the configured user agent and timeouts
///
/// # Example
///
/// ```no_run
/// use catalog_harvester::config::BrowserConfig;
/// use catalog_harvester::session::build_http_client;
///
/// let client = build_http_client(&BrowserConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &BrowserConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.render_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Session that loads pages with plain GET requests
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    /// Creates a session from the browser configuration
    pub fn new(config: &BrowserConfig) -> SessionResult<Self> {
        let client =
            build_http_client(config).map_err(|e| SessionError::Launch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn render(&self, url: &Url, wait: &RenderWait) -> SessionResult<String> {
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(wait.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SessionError::RenderTimeout {
                        url: url.to_string(),
                        marker: wait.marker.clone(),
                    }
                } else {
                    SessionError::Http {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SessionError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if !has_marker(&body, &wait.marker) {
            return Err(SessionError::RenderTimeout {
                url: url.to_string(),
                marker: wait.marker.clone(),
            });
        }

        Ok(body)
    }

    async fn shutdown(&self) -> SessionResult<()> {
        Ok(())
    }
}

/// Returns true if the document contains an element matching `marker`
///
/// An unparsable marker never matches.
fn has_marker(html: &str, marker: &str) -> bool {
    let Ok(selector) = Selector::parse(marker) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}
