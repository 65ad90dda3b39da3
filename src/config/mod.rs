//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration file is optional: `Config::default()` targets the AUC
//! digital collections with the stock pacing and retry settings.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Retries per entry: {}", config.retry.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Backend, BrowserConfig, Config, CrawlConfig, OutputConfig, RecordFormat, RetryConfig,
    SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
