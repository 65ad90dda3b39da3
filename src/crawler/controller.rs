//! Crawl controller - main harvest orchestration logic
//!
//! The controller owns the only browser session of a run and lends it to the
//! page navigator and the extraction pipeline. Everything happens strictly in
//! sequence: one listing page, then its entries one by one, with fixed pacing
//! delays in between.
//!
//! Per-page and per-entry problems never escape this module; they turn into
//! retries and, once retries run out, into failure records. Only invalid
//! arguments and a failed final flush are returned as errors.

use crate::config::Config;
use crate::crawler::navigator::{CatalogPage, PageNavigator};
use crate::crawler::retry::{retry, RetryOutcome, RetryPolicy};
use crate::extract::ExtractionPipeline;
use crate::session::BrowserSession;
use crate::state::{CrawlSession, FailureRecord, FieldMap, PageSummary, RunMode};
use crate::storage::RecordStore;
use crate::url::normalize_detail_url;
use crate::{ConfigError, HarvestError};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Run-level knobs of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub retry_policy: RetryPolicy,
    /// Maximum entries taken from one listing page
    pub per_page_cap: Option<usize>,
    pub entry_delay: Duration,
    pub page_delay: Duration,
    /// ID of the first accepted entry
    pub first_id: u64,
    /// Flush to the record stores after this many pages, at least 1
    pub flush_every_pages: u32,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_policy: RetryPolicy::from_config(&config.retry),
            per_page_cap: config.crawl.per_page_cap,
            entry_delay: config.crawl.entry_delay(),
            page_delay: config.crawl.page_delay(),
            first_id: config.crawl.first_id,
            flush_every_pages: config.crawl.flush_every_pages.max(1),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Link counts of a validate-only run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub pages: Vec<PageSummary>,
    /// Listing pages whose harvest exhausted every retry
    pub failures: Vec<FailureRecord>,
}

impl ValidationReport {
    pub fn total_links(&self) -> usize {
        self.pages.iter().map(|page| page.links).sum()
    }

    /// False when no page in the range produced a single link
    pub fn has_data(&self) -> bool {
        self.pages.iter().any(|page| page.links > 0)
    }
}

/// Drives page ranges, retries and record stores around one browser session
pub struct CrawlController {
    browser: Box<dyn BrowserSession>,
    navigator: PageNavigator,
    pipeline: ExtractionPipeline,
    stores: Vec<Box<dyn RecordStore>>,
    settings: ControllerSettings,
}

impl CrawlController {
    pub fn new(
        browser: Box<dyn BrowserSession>,
        navigator: PageNavigator,
        pipeline: ExtractionPipeline,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            browser,
            navigator,
            pipeline,
            stores: Vec::new(),
            settings,
        }
    }

    /// Builds a controller with the standard navigator and pipeline
    pub fn from_config(
        config: &Config,
        browser: Box<dyn BrowserSession>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            browser,
            PageNavigator::from_config(config)?,
            ExtractionPipeline::from_config(config)?,
            ControllerSettings::from_config(config),
        ))
    }

    /// Adds a record store that receives every flush
    pub fn with_store(mut self, store: Box<dyn RecordStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn add_store(&mut self, store: Box<dyn RecordStore>) {
        self.stores.push(store);
    }

    /// Harvests a single listing page and its entries
    pub async fn run_page(&mut self, page: u32) -> Result<CrawlSession, HarvestError> {
        check_range(page, page)?;
        self.crawl_pages(RunMode::SinglePage(page), page, page).await
    }

    /// Harvests every listing page in `start..=end`
    pub async fn run_range(&mut self, start: u32, end: u32) -> Result<CrawlSession, HarvestError> {
        check_range(start, end)?;
        self.crawl_pages(RunMode::PageRange { start, end }, start, end)
            .await
    }

    /// Counts the links of every page in `start..=end` without extracting anything
    pub async fn validate(&self, start: u32, end: u32) -> Result<ValidationReport, HarvestError> {
        check_range(start, end)?;
        let mut run = self.new_session(RunMode::ValidateOnly { start, end });
        tracing::info!("Starting {}", run.mode);

        for page in start..=end {
            if let Some(catalog) = self.harvest_page(&mut run, page).await {
                tracing::info!("Page {}: {} link(s)", page, catalog.urls.len());
            }
            if page < end {
                self.pause(self.settings.page_delay).await;
            }
        }

        run.finish();
        Ok(ValidationReport {
            pages: run.pages().to_vec(),
            failures: run.failures().to_vec(),
        })
    }

    /// Re-attempts the URLs of an earlier failure file
    ///
    /// Plain failures are re-extracted; listing page failures are harvested
    /// again together with their entries. Duplicate URLs in the file are
    /// attempted once. Records of earlier runs are never touched.
    ///
    /// Failures not yet attempted stay in every flush, so an interrupted run
    /// leaves a failure file that still names them.
    pub async fn retry_failures(
        &mut self,
        failures: Vec<FailureRecord>,
        source: PathBuf,
    ) -> Result<CrawlSession, HarvestError> {
        let mut unique = HashSet::new();
        let mut pages = Vec::new();
        let mut urls = Vec::new();
        let mut pending = Vec::new();
        for mut failure in failures {
            if !unique.insert(failure.url.clone()) {
                continue;
            }
            match failure.page {
                Some(page) if page > 0 => {
                    pages.push(page);
                    pending.push(failure);
                }
                Some(_) => {
                    return Err(HarvestError::FailureFile {
                        path: source,
                        message: format!("invalid page number for {}", failure.url),
                    })
                }
                None => {
                    let url = Url::parse(&failure.url).map_err(|e| HarvestError::FailureFile {
                        path: source.clone(),
                        message: format!("invalid URL {:?}: {}", failure.url, e),
                    })?;
                    let url = normalize_detail_url(url);
                    failure.url = url.to_string();
                    urls.push(url);
                    pending.push(failure);
                }
            }
        }

        let mut run = self.new_session(RunMode::RetryFailures { source });
        run.add_pending(pending);
        self.begin(&run)?;
        tracing::info!(
            "Starting {}: {} entr(y/ies) and {} listing page(s)",
            run.mode,
            urls.len(),
            pages.len()
        );

        self.extract_entries(&mut run, &urls).await;
        if !urls.is_empty() {
            self.flush(&run);
        }

        for (i, page) in pages.iter().enumerate() {
            if i > 0 || !urls.is_empty() {
                self.pause(self.settings.page_delay).await;
            }
            self.crawl_page(&mut run, *page).await;
            self.flush(&run);
        }

        self.finish(run)
    }

    /// Releases the browser session
    pub async fn shutdown(self) -> Result<(), HarvestError> {
        self.browser.shutdown().await?;
        Ok(())
    }

    async fn crawl_pages(
        &mut self,
        mode: RunMode,
        start: u32,
        end: u32,
    ) -> Result<CrawlSession, HarvestError> {
        let mut run = self.new_session(mode);
        self.begin(&run)?;
        tracing::info!("Starting {}", run.mode);

        debug_assert!(self.settings.flush_every_pages >= 1);
        for (done, page) in (start..=end).enumerate() {
            self.crawl_page(&mut run, page).await;

            if (done as u32 + 1) % self.settings.flush_every_pages == 0 {
                self.flush(&run);
            }
            if page < end {
                self.pause(self.settings.page_delay).await;
            }
        }

        self.finish(run)
    }

    /// Harvests one listing page, then extracts its (capped) entries
    async fn crawl_page(&self, run: &mut CrawlSession, page: u32) {
        let Some(catalog) = self.harvest_page(run, page).await else {
            return;
        };

        let mut urls = catalog.urls;
        if let Some(cap) = self.settings.per_page_cap {
            if urls.len() > cap {
                tracing::info!("Page {}: limiting to the first {} entries", page, cap);
                urls.truncate(cap);
            }
        }

        self.extract_entries(run, &urls).await;
        tracing::info!(
            "Page {} done: {} record(s), {} failure(s) so far",
            page,
            run.records().len(),
            run.failures().len()
        );
    }

    /// Loads a listing page with retries, recording its link count or failure
    async fn harvest_page(&self, run: &mut CrawlSession, page: u32) -> Option<CatalogPage> {
        let target = self
            .navigator
            .page_url(page)
            .map(String::from)
            .unwrap_or_else(|_| format!("listing page {}", page));

        let browser = self.browser.as_ref();
        let navigator = &self.navigator;
        let outcome = retry(
            &self.settings.retry_policy,
            &target,
            move || navigator.load_page(browser, page),
            |catalog: &CatalogPage| !catalog.is_empty(),
        )
        .await;

        let catalog = match outcome {
            RetryOutcome::Success { value, .. } => {
                run.record_page(page, value.urls.len());
                Some(value)
            }
            RetryOutcome::Exhausted(failure) => {
                tracing::error!("No entries harvested from page {}", page);
                run.record_page(page, 0);
                run.record_failure(failure.for_page(page));
                None
            }
        };
        run.resolve_page(page);
        catalog
    }

    async fn extract_entries(&self, run: &mut CrawlSession, urls: &[Url]) {
        let total = urls.len();
        let mut first = true;

        for (i, url) in urls.iter().enumerate() {
            if run.has_seen(url.as_str()) {
                tracing::debug!("Skipping {}: already attempted in this run", url);
                run.resolve_entry(url.as_str());
                continue;
            }
            if !first {
                self.pause(self.settings.entry_delay).await;
            }
            first = false;

            tracing::info!("Entry {}/{}: {}", i + 1, total, url);
            match self.extract_entry(url).await {
                RetryOutcome::Success { value, attempts } => {
                    let field_count = value.len();
                    let record = run.accept(url.as_str(), value);
                    tracing::info!(
                        "Accepted entry {} with {} field(s) after {} attempt(s): {}",
                        record.id,
                        field_count,
                        attempts,
                        record.title().unwrap_or("untitled")
                    );
                }
                RetryOutcome::Exhausted(failure) => {
                    run.record_failure(failure);
                }
            }
            run.resolve_entry(url.as_str());
        }
    }

    async fn extract_entry(&self, url: &Url) -> RetryOutcome<FieldMap> {
        let browser = self.browser.as_ref();
        let pipeline = &self.pipeline;
        retry(
            &self.settings.retry_policy,
            url.as_str(),
            move || pipeline.extract(browser, url),
            |fields: &FieldMap| pipeline.is_accepted(fields),
        )
        .await
    }

    fn new_session(&self, mode: RunMode) -> CrawlSession {
        CrawlSession::new(
            mode,
            self.settings.per_page_cap,
            self.settings.retry_policy.clone(),
            self.settings.first_id,
        )
    }

    fn begin(&mut self, run: &CrawlSession) -> Result<(), HarvestError> {
        for store in &mut self.stores {
            store.begin_run(run)?;
        }
        Ok(())
    }

    /// Periodic flush; a failing store is logged and the run goes on
    fn flush(&mut self, run: &CrawlSession) {
        for store in &mut self.stores {
            if let Err(e) = store.flush(run) {
                tracing::warn!("Flush to {} store failed: {}", store.name(), e);
            }
        }
    }

    fn finish(&mut self, mut run: CrawlSession) -> Result<CrawlSession, HarvestError> {
        run.finish();
        for store in &mut self.stores {
            store.finish_run(&run)?;
        }
        tracing::info!(
            "Finished {}: {} record(s), {} failure(s)",
            run.mode,
            run.records().len(),
            run.failures().len()
        );
        Ok(run)
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn check_range(start: u32, end: u32) -> Result<(), ConfigError> {
    if start == 0 {
        return Err(ConfigError::Validation(
            "page numbers start at 1".to_string(),
        ));
    }
    if start > end {
        return Err(ConfigError::Validation(format!(
            "start page {} is after end page {}",
            start, end
        )));
    }
    Ok(())
}
