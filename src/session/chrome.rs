//! Headless Chromium session
//!
//! One browser and one tab are launched for the whole run and reused for
//! every navigation. The CDP handler runs on its own task; it is aborted when
//! the session is dropped, so the browser is torn down even if a run panics.

use crate::config::BrowserConfig;
use crate::session::{BrowserSession, RenderWait, SessionError, SessionResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// Poll interval while waiting for the render marker
const MARKER_POLL: Duration = Duration::from_millis(250);

/// A single Chromium tab driven over the DevTools protocol
pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// Launches Chromium and opens the tab used for the run
    pub async fn launch(config: &BrowserConfig) -> SessionResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", config.user_agent))
            .request_timeout(config.render_timeout());
        if !config.headless {
            builder = builder.with_head();
        }
        let cdp_config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        tracing::info!(
            "Chromium session started ({})",
            if config.headless { "headless" } else { "headed" }
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    async fn wait_for_marker(&self, url: &Url, wait: &RenderWait) -> SessionResult<()> {
        let poll = async {
            loop {
                if self.page.find_element(wait.marker.as_str()).await.is_ok() {
                    return;
                }
                tokio::time::sleep(MARKER_POLL).await;
            }
        };

        tokio::time::timeout(wait.timeout, poll)
            .await
            .map_err(|_| SessionError::RenderTimeout {
                url: url.to_string(),
                marker: wait.marker.clone(),
            })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn render(&self, url: &Url, wait: &RenderWait) -> SessionResult<String> {
        let navigation = tokio::time::timeout(wait.timeout, self.page.goto(url.as_str())).await;
        match navigation {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(SessionError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SessionError::RenderTimeout {
                    url: url.to_string(),
                    marker: wait.marker.clone(),
                })
            }
        }

        self.wait_for_marker(url, wait).await?;
        tokio::time::sleep(wait.settle).await;

        self.page
            .content()
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn shutdown(&self) -> SessionResult<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close Chromium cleanly: {}", e);
        }
        let _ = browser.wait().await;
        self.handler.abort();
        tracing::info!("Chromium session closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
