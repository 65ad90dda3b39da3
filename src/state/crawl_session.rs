//! Bounded state of one harvest run
//!
//! A `CrawlSession` is created when a run starts, owned by the crawl
//! controller for the run's lifetime, flushed to the record stores while the
//! run progresses, and handed back to the caller when it ends.

use crate::crawler::RetryPolicy;
use crate::state::records::{EntryRecord, FailureRecord, FieldMap};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// The kind of run a session belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    SinglePage(u32),
    PageRange { start: u32, end: u32 },
    ValidateOnly { start: u32, end: u32 },
    RetryFailures { source: PathBuf },
}

impl RunMode {
    /// Short identifier used in logs and the SQLite `runs` table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePage(_) => "single-page",
            Self::PageRange { .. } => "page-range",
            Self::ValidateOnly { .. } => "validate-only",
            Self::RetryFailures { .. } => "retry-from-failure-file",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinglePage(page) => write!(f, "single page {}", page),
            Self::PageRange { start, end } => write!(f, "pages {}..={}", start, end),
            Self::ValidateOnly { start, end } => write!(f, "validate pages {}..={}", start, end),
            Self::RetryFailures { source } => write!(f, "retry failures from {}", source.display()),
        }
    }
}

/// Link count harvested from one listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub page: u32,
    /// Links found on the page before any per-page cap
    pub links: usize,
}

/// Accumulated records, failures and the ID counter for one run
#[derive(Debug, Clone)]
pub struct CrawlSession {
    pub mode: RunMode,
    pub per_page_cap: Option<usize>,
    pub retry_policy: RetryPolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    records: Vec<EntryRecord>,
    failures: Vec<FailureRecord>,
    pending: Vec<FailureRecord>,
    pages: Vec<PageSummary>,
    seen: HashSet<String>,
    next_id: u64,
}

impl CrawlSession {
    /// Creates a session whose first accepted entry gets `first_id`
    pub fn new(
        mode: RunMode,
        per_page_cap: Option<usize>,
        retry_policy: RetryPolicy,
        first_id: u64,
    ) -> Self {
        Self {
            mode,
            per_page_cap,
            retry_policy,
            started_at: Utc::now(),
            finished_at: None,
            records: Vec::new(),
            failures: Vec::new(),
            pending: Vec::new(),
            pages: Vec::new(),
            seen: HashSet::new(),
            next_id: first_id,
        }
    }

    /// Accepts extracted fields for `url` and assigns the next ID
    ///
    /// Any failure previously recorded for the same URL is dropped so that a
    /// URL never ends up in both lists.
    pub fn accept(&mut self, url: &str, fields: FieldMap) -> &EntryRecord {
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(url.to_string());
        self.failures.retain(|failure| failure.url != url);
        self.records.push(EntryRecord::new(id, url, fields));
        &self.records[self.records.len() - 1]
    }

    /// Records an exhausted URL unless it has already produced a record
    ///
    /// Returns false when the failure was ignored.
    pub fn record_failure(&mut self, failure: FailureRecord) -> bool {
        if self.has_record(&failure.url) || self.failures.iter().any(|f| f.url == failure.url) {
            return false;
        }
        self.seen.insert(failure.url.clone());
        self.failures.push(failure);
        true
    }

    /// Notes the link count found on a listing page
    pub fn record_page(&mut self, page: u32, links: usize) {
        self.pages.push(PageSummary { page, links });
    }

    /// Returns true if the URL was already attempted in this run
    pub fn has_seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn has_record(&self, url: &str) -> bool {
        self.records.iter().any(|record| record.source_url == url)
    }

    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Carries over failures of an earlier run that are still to be attempted
    ///
    /// Pending failures are persisted with every flush until the entry or
    /// listing page they name has been attempted in this run.
    pub fn add_pending(&mut self, failures: impl IntoIterator<Item = FailureRecord>) {
        self.pending.extend(failures);
    }

    /// Drops the pending entry failure for `url`
    pub fn resolve_entry(&mut self, url: &str) {
        self.pending
            .retain(|failure| failure.is_listing() || failure.url != url);
    }

    /// Drops the pending failure of listing page `page`
    pub fn resolve_page(&mut self, page: u32) {
        self.pending.retain(|failure| failure.page != Some(page));
    }

    pub fn pending(&self) -> &[FailureRecord] {
        &self.pending
    }

    /// Failures a store must persist: this run's, then the still pending ones
    pub fn unresolved_failures(&self) -> Vec<FailureRecord> {
        self.failures.iter().chain(&self.pending).cloned().collect()
    }

    pub fn pages(&self) -> &[PageSummary] {
        &self.pages
    }

    /// The ID the next accepted entry will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Marks the session as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
