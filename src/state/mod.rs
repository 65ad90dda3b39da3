//! Data model of a harvest run
//!
//! - `records`: accepted entry records and failure records
//! - `crawl_session`: the per-run accumulator with the ID counter

mod crawl_session;
mod records;

pub use crawl_session::{CrawlSession, PageSummary, RunMode};
pub use records::{EntryRecord, FailureRecord, FieldMap, IMAGE_URL_FIELD};
