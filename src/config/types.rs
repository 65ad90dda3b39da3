use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the harvester
///
/// Every section and key is optional; missing values fall back to the
/// defaults tuned for the AUC digital collections site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the catalog; relative links and images resolve against it
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Listing path template, `{page}` is replaced by the page number
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// CSS selector that appears once the client-side app has rendered
    #[serde(rename = "render-marker", default = "default_render_marker")]
    pub render_marker: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            render_marker: default_render_marker(),
        }
    }
}

/// Which browser session implementation drives navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Plain HTTP fetches of the server-rendered source
    #[default]
    Http,
    /// Headless Chromium over CDP (requires the `browser` feature)
    Chrome,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Run Chromium without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum wait for the render marker (seconds)
    #[serde(rename = "render-timeout-secs", default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Extra wait after the marker appears on listing pages (milliseconds)
    #[serde(rename = "listing-settle-ms", default = "default_listing_settle")]
    pub listing_settle_ms: u64,

    /// Extra wait after the marker appears on detail pages (milliseconds)
    #[serde(rename = "detail-settle-ms", default = "default_detail_settle")]
    pub detail_settle_ms: u64,
}

impl BrowserConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn listing_settle(&self) -> Duration {
        Duration::from_millis(self.listing_settle_ms)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            headless: true,
            user_agent: default_user_agent(),
            render_timeout_secs: default_render_timeout(),
            listing_settle_ms: default_listing_settle(),
            detail_settle_ms: default_detail_settle(),
        }
    }
}

/// Crawl pacing and acceptance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Maximum number of entries taken from each listing page
    #[serde(rename = "per-page-cap", default)]
    pub per_page_cap: Option<usize>,

    /// Delay between two entries (milliseconds)
    #[serde(rename = "entry-delay-ms", default = "default_entry_delay")]
    pub entry_delay_ms: u64,

    /// Delay between two listing pages (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay")]
    pub page_delay_ms: u64,

    /// Minimum number of non-image fields for an entry to be accepted
    #[serde(rename = "min-fields", default = "default_min_fields")]
    pub min_fields: usize,

    /// ID given to the first accepted entry of a run
    #[serde(rename = "first-id", default = "default_first_id")]
    pub first_id: u64,

    /// Flush the session to the record stores every N pages
    #[serde(rename = "flush-every-pages", default = "default_flush_every")]
    pub flush_every_pages: u32,

    /// Number of failure records a run may produce and still exit cleanly
    #[serde(rename = "failure-tolerance", default)]
    pub failure_tolerance: usize,
}

impl CrawlConfig {
    pub fn entry_delay(&self) -> Duration {
        Duration::from_millis(self.entry_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            per_page_cap: None,
            entry_delay_ms: default_entry_delay(),
            page_delay_ms: default_page_delay(),
            min_fields: default_min_fields(),
            first_id: default_first_id(),
            flush_every_pages: default_flush_every(),
            failure_tolerance: 0,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// Layout of the records file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// A single pretty-printed JSON array
    JsonArray,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the accepted entry records
    #[serde(rename = "records-path", default = "default_records_path")]
    pub records_path: String,

    /// Path of the failure records
    #[serde(rename = "failures-path", default = "default_failures_path")]
    pub failures_path: String,

    #[serde(default)]
    pub format: RecordFormat,

    /// Optional SQLite database mirroring every run
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Optional markdown summary written when a run finishes
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            failures_path: default_failures_path(),
            format: RecordFormat::default(),
            database_path: None,
            summary_path: None,
        }
    }
}

fn default_base_url() -> String {
    "https://digitalcollections.aucegypt.edu".to_string()
}

fn default_listing_path() -> String {
    "/digital/search/page/{page}".to_string()
}

fn default_render_marker() -> String {
    "#root".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_render_timeout() -> u64 {
    20
}

fn default_listing_settle() -> u64 {
    8000
}

fn default_detail_settle() -> u64 {
    6000
}

fn default_entry_delay() -> u64 {
    1000
}

fn default_page_delay() -> u64 {
    3000
}

fn default_min_fields() -> usize {
    2
}

fn default_first_id() -> u64 {
    1
}

fn default_flush_every() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_records_path() -> String {
    "records.jsonl".to_string()
}

fn default_failures_path() -> String {
    "failures.json".to_string()
}
