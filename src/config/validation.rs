use crate::config::types::{BrowserConfig, Config, CrawlConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_browser_config(&config.browser)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the target site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if !config.listing_path.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing-path must contain the {{page}} placeholder, got '{}'",
            config.listing_path
        )));
    }

    if Selector::parse(&config.render_marker).is_err() {
        return Err(ConfigError::Validation(format!(
            "render-marker '{}' is not a valid CSS selector",
            config.render_marker
        )));
    }

    Ok(())
}

/// Validates browser session configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.render_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "render-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl pacing and acceptance configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.min_fields < 1 {
        return Err(ConfigError::Validation(
            "min-fields must be >= 1".to_string(),
        ));
    }

    if config.flush_every_pages < 1 {
        return Err(ConfigError::Validation(
            "flush-every-pages must be >= 1".to_string(),
        ));
    }

    if config.per_page_cap == Some(0) {
        return Err(ConfigError::Validation(
            "per-page-cap must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records-path cannot be empty".to_string(),
        ));
    }

    if config.failures_path.is_empty() {
        return Err(ConfigError::Validation(
            "failures-path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.failures_path {
        return Err(ConfigError::Validation(format!(
            "records-path and failures-path must differ, both are '{}'",
            config.records_path
        )));
    }

    Ok(())
}
