//! Catalog Harvester: a resilient crawler for JavaScript-rendered digital library catalogs
//!
//! This crate walks the paginated listing of a digital collection, visits every
//! item detail page through one long-lived browser session, and extracts
//! bibliographic metadata with a cascade of extraction strategies. Entries that
//! cannot be extracted after bounded retries are written to a failure file that
//! a later run can reprocess.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod session;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvester operations
///
/// Only configuration problems, unreadable failure files and a failed final
/// flush surface as `HarvestError`. Per-page and per-entry errors are absorbed
/// by the crawl controller and turned into retries or failure records.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser session error: {0}")]
    Session(#[from] session::SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Failed to read failure file {path}: {message}")]
    FailureFile { path: PathBuf, message: String },

    #[error("Failed to read records file {path}: {message}")]
    RecordsFile { path: PathBuf, message: String },

}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{retry, CrawlController, RetryOutcome, RetryPolicy};
pub use extract::{ExtractionPipeline, FieldRecognizer};
pub use session::BrowserSession;
pub use state::{CrawlSession, EntryRecord, FailureRecord, FieldMap};
