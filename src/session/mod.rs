//! Browser session abstraction
//!
//! A `BrowserSession` is the single stateful automation handle of a run. It is
//! created once, owned by the crawl controller, lent by reference to the page
//! navigator and the extraction pipeline, and shut down when the run ends.
//!
//! Two implementations are provided:
//! - `HttpSession`: plain reqwest fetches of the server-rendered source
//! - `ChromeSession` (feature `browser`): one headless Chromium tab over CDP

mod http;

#[cfg(feature = "browser")]
mod chrome;

pub use http::{build_http_client, HttpSession};

#[cfg(feature = "browser")]
pub use chrome::ChromeSession;

use crate::config::{Backend, BrowserConfig};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while loading a page through a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Render marker '{marker}' did not appear on {url}")]
    RenderTimeout { url: String, marker: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to start browser: {0}")]
    Launch(String),
}

impl SessionError {
    /// Returns true if the page simply did not finish rendering in time
    pub fn is_render_timeout(&self) -> bool {
        matches!(self, Self::RenderTimeout { .. })
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// How long to wait for client-side rendering on one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderWait {
    /// CSS selector present once the app has mounted
    pub marker: String,
    /// Upper bound on waiting for the marker
    pub timeout: Duration,
    /// Extra delay after the marker appears, for asynchronously loaded content
    pub settle: Duration,
}

impl RenderWait {
    pub fn new(marker: impl Into<String>, timeout: Duration, settle: Duration) -> Self {
        Self {
            marker: marker.into(),
            timeout,
            settle,
        }
    }
}

/// A stateful page-rendering handle shared by every navigation of a run
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates to `url`, waits for rendering, and returns the page source
    async fn render(&self, url: &Url, wait: &RenderWait) -> SessionResult<String>;

    /// Releases the underlying browser or connection resources
    async fn shutdown(&self) -> SessionResult<()>;
}

/// Opens the session backend selected in the configuration
pub async fn open_session(
    config: &BrowserConfig,
) -> Result<Box<dyn BrowserSession>, crate::HarvestError> {
    match config.backend {
        Backend::Http => {
            let session = HttpSession::new(config)?;
            Ok(Box::new(session))
        }
        #[cfg(feature = "browser")]
        Backend::Chrome => {
            let session = ChromeSession::launch(config).await?;
            Ok(Box::new(session))
        }
        #[cfg(not(feature = "browser"))]
        Backend::Chrome => Err(crate::ConfigError::Validation(
            "backend \"chrome\" requires building with the `browser` feature".to_string(),
        )
        .into()),
    }
}
