//! Crawler module for listing navigation and harvest orchestration
//!
//! This module contains the core harvesting logic, including:
//! - Listing page rendering and detail link harvesting
//! - Bounded retries shared by link harvesting and extraction
//! - Run orchestration for every run mode

mod controller;
mod navigator;
mod retry;

pub use controller::{ControllerSettings, CrawlController, ValidationReport};
pub use navigator::{CatalogPage, PageNavigator, DETAIL_PATH_MARKERS, LINK_SELECTORS};
pub use retry::{retry, RetryOutcome, RetryPolicy};
