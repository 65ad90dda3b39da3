//! Output module for run summaries and reports
//!
//! This module handles:
//! - Computing record and field coverage statistics
//! - Printing statistics and validation reports
//! - Generating markdown summaries of finished runs

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, print_validation_report, RunStatistics};
