//! Integration tests for the crawl controller
//!
//! These tests drive the controller through a scripted browser session so
//! every run mode can be checked end-to-end without a network or a browser.

use async_trait::async_trait;
use catalog_harvester::config::RecordFormat;
use catalog_harvester::crawler::{ControllerSettings, CrawlController, PageNavigator, RetryPolicy};
use catalog_harvester::extract::{
    AcceptancePolicy, ContentDmRecognizer, DetailPage, ExtractionPipeline, ExtractionStrategy,
    FieldRecognizer, ImageResolver,
};
use catalog_harvester::session::{BrowserSession, RenderWait, SessionError, SessionResult};
use catalog_harvester::state::{CrawlSession, FailureRecord, FieldMap};
use catalog_harvester::storage::{
    load_failure_file, load_records_file, JsonRecordStore, RecordStore, StorageResult,
};
use catalog_harvester::HarvestError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

const BASE: &str = "https://catalog.test";

/// What the scripted session answers for one navigation
#[derive(Debug, Clone)]
enum Response {
    Page(String),
    Timeout,
    Fail,
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, Vec<Response>>,
    calls: HashMap<String, usize>,
    shutdowns: usize,
}

/// Browser session that replays canned responses per URL
///
/// The n-th navigation to a URL gets its n-th response; the last response
/// repeats once the list runs out. Unknown URLs answer 404.
#[derive(Clone, Default)]
struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSession {
    fn respond(&self, url: &str, responses: Vec<Response>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(url.to_string(), responses);
        self
    }

    fn calls(&self, url: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn detail_calls(&self) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(url, _)| url.contains("/id/"))
            .map(|(_, count)| count)
            .sum()
    }

    fn shutdowns(&self) -> usize {
        self.script.lock().unwrap().shutdowns
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn render(&self, url: &Url, wait: &RenderWait) -> SessionResult<String> {
        let mut script = self.script.lock().unwrap();
        let attempt = {
            let count = script.calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let Some(responses) = script.responses.get(url.as_str()) else {
            return Err(SessionError::Status {
                url: url.to_string(),
                status: 404,
            });
        };
        match responses[attempt.min(responses.len() - 1)].clone() {
            Response::Page(source) => Ok(source),
            Response::Timeout => Err(SessionError::RenderTimeout {
                url: url.to_string(),
                marker: wait.marker.clone(),
            }),
            Response::Fail => Err(SessionError::Navigation {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
        }
    }

    async fn shutdown(&self) -> SessionResult<()> {
        self.script.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}

fn base_url() -> Url {
    Url::parse(BASE).unwrap()
}

fn listing_url(page: u32) -> String {
    format!("{}/digital/search/page/{}", BASE, page)
}

fn detail_url(id: u32) -> String {
    format!("{}/digital/collection/p15795coll/id/{}", BASE, id)
}

fn listing_page(ids: &[u32]) -> String {
    let links: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="search-result"><a href="/digital/collection/p15795coll/id/{}/">Item {}</a></div>"#,
                id, id
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="root"><a href="/about">About</a>{}</div></body></html>"#,
        links
    )
}

fn detail_page(id: u32, title: &str) -> String {
    let state = format!(
        r#"{{"item":{{"item":{{"parent":{{"fields":[{{"key":"title","value":"{}"}},{{"key":"creato","value":"Lehnert & Landrock"}},{{"key":"date","value":"1924"}}]}}}}}}}}"#,
        title
    );
    let escaped = state.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"<html><head><script>window.__INITIAL_STATE__ = JSON.parse("{}");</script></head>
        <body><div id="root"><div class="item-image"><img src="/iiif/2/p15795coll:{}/full/full/0/default.jpg"></div></div></body></html>"#,
        escaped, id
    )
}

fn blank_page() -> String {
    r#"<html><body><div id="root"><p>Loading...</p></div></body></html>"#.to_string()
}

fn wait() -> RenderWait {
    RenderWait::new("#root", Duration::from_secs(1), Duration::ZERO)
}

fn settings(max_retries: u32) -> ControllerSettings {
    ControllerSettings {
        retry_policy: RetryPolicy::new(max_retries, Duration::ZERO),
        per_page_cap: None,
        entry_delay: Duration::ZERO,
        page_delay: Duration::ZERO,
        first_id: 1,
        flush_every_pages: 1,
    }
}

fn controller(session: &ScriptedSession, settings: ControllerSettings) -> CrawlController {
    CrawlController::new(
        Box::new(session.clone()),
        PageNavigator::new(base_url(), "/digital/search/page/{page}", wait()),
        ExtractionPipeline::standard(base_url(), AcceptancePolicy::default(), wait()),
        settings,
    )
}

/// Strategy that counts its invocations and returns fixed fields
struct CountingStrategy {
    calls: Arc<AtomicUsize>,
    fields: Vec<(&'static str, &'static str)>,
}

impl ExtractionStrategy for CountingStrategy {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn extract(&self, _page: &DetailPage, _recognizer: &dyn FieldRecognizer) -> FieldMap {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Store that keeps the failure URLs written by every flush
#[derive(Clone, Default)]
struct FailureSnapshots {
    flushed: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FailureSnapshots {
    fn taken(&self) -> Vec<Vec<String>> {
        self.flushed.lock().unwrap().clone()
    }

    fn capture(&self, session: &CrawlSession) {
        let urls = session
            .unresolved_failures()
            .into_iter()
            .map(|failure| failure.url)
            .collect();
        self.flushed.lock().unwrap().push(urls);
    }
}

impl RecordStore for FailureSnapshots {
    fn name(&self) -> &'static str {
        "snapshots"
    }

    fn begin_run(&mut self, _session: &CrawlSession) -> StorageResult<()> {
        Ok(())
    }

    fn flush(&mut self, session: &CrawlSession) -> StorageResult<()> {
        self.capture(session);
        Ok(())
    }

    fn finish_run(&mut self, session: &CrawlSession) -> StorageResult<()> {
        self.capture(session);
        Ok(())
    }
}

#[tokio::test]
async fn test_single_page_end_to_end_record() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[5]))])
        .respond(&detail_url(5), vec![Response::Page(detail_page(5, "Street in Cairo"))]);

    let mut controller = controller(&session, settings(2));
    let run = controller.run_page(1).await.unwrap();

    assert_eq!(run.records().len(), 1);
    assert!(run.failures().is_empty());

    let record = &run.records()[0];
    assert_eq!(record.id, 1);
    assert_eq!(record.source_url, detail_url(5));
    let fields: Vec<(&str, &str)> = record
        .fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("Title", "Street in Cairo"),
            ("Creator", "Lehnert & Landrock"),
            ("Date", "1924"),
            (
                "Image URL",
                "https://catalog.test/iiif/2/p15795coll:5/full/full/0/default.jpg"
            ),
        ]
    );

    controller.shutdown().await.unwrap();
    assert_eq!(session.shutdowns(), 1);
}

#[tokio::test]
async fn test_ids_are_gap_free_across_failures() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2, 3]))])
        .respond(&listing_url(2), vec![Response::Page(listing_page(&[4, 5, 6]))])
        .respond(&detail_url(1), vec![Response::Page(detail_page(1, "One"))])
        .respond(&detail_url(2), vec![Response::Page(blank_page())])
        .respond(&detail_url(3), vec![Response::Page(detail_page(3, "Three"))])
        .respond(&detail_url(4), vec![Response::Fail])
        .respond(&detail_url(5), vec![Response::Page(detail_page(5, "Five"))])
        .respond(&detail_url(6), vec![Response::Page(detail_page(6, "Six"))]);

    let mut controller = controller(&session, settings(2));
    let run = controller.run_range(1, 2).await.unwrap();

    let ids: Vec<u64> = run.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    let titles: Vec<&str> = run.records().iter().filter_map(|r| r.title()).collect();
    assert_eq!(titles, vec!["One", "Three", "Five", "Six"]);

    let failed: Vec<&str> = run.failures().iter().map(|f| f.url.as_str()).collect();
    assert_eq!(failed, vec![detail_url(2), detail_url(4)]);
    for failure in run.failures() {
        assert_eq!(failure.attempts, 3);
        assert!(!run.has_record(&failure.url));
    }
    assert_eq!(
        run.failures()[0].last_error.as_deref(),
        Some("result rejected")
    );
    assert!(run.failures()[1]
        .last_error
        .as_deref()
        .unwrap()
        .contains("connection reset"));

    assert_eq!(session.calls(&detail_url(2)), 3);
    assert_eq!(session.calls(&detail_url(4)), 3);
    assert_eq!(session.calls(&detail_url(1)), 1);
}

#[tokio::test]
async fn test_flaky_entry_recovers_within_retries() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[9]))])
        .respond(
            &detail_url(9),
            vec![
                Response::Timeout,
                Response::Page(blank_page()),
                Response::Page(detail_page(9, "Recovered")),
            ],
        );

    let mut controller = controller(&session, settings(2));
    let run = controller.run_page(1).await.unwrap();

    assert_eq!(run.records().len(), 1);
    assert_eq!(run.records()[0].title(), Some("Recovered"));
    assert!(run.failures().is_empty());
    assert_eq!(session.calls(&detail_url(9)), 3);
}

#[tokio::test]
async fn test_empty_listing_page_becomes_listing_failure() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(blank_page())])
        .respond(
            &listing_url(2),
            vec![Response::Timeout, Response::Page(listing_page(&[7]))],
        )
        .respond(&detail_url(7), vec![Response::Page(detail_page(7, "Seven"))]);

    let mut controller = controller(&session, settings(1));
    let run = controller.run_range(1, 2).await.unwrap();

    assert_eq!(session.calls(&listing_url(1)), 2);
    assert_eq!(run.failures().len(), 1);
    let failure = &run.failures()[0];
    assert_eq!(failure.url, listing_url(1));
    assert_eq!(failure.page, Some(1));
    assert_eq!(failure.attempts, 2);

    assert_eq!(run.records().len(), 1);
    assert_eq!(run.records()[0].id, 1);
    let links: Vec<(u32, usize)> = run.pages().iter().map(|p| (p.page, p.links)).collect();
    assert_eq!(links, vec![(1, 0), (2, 1)]);
}

#[tokio::test]
async fn test_duplicate_links_are_extracted_once() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2]))])
        .respond(&listing_url(2), vec![Response::Page(listing_page(&[2, 3]))])
        .respond(&detail_url(1), vec![Response::Page(detail_page(1, "One"))])
        .respond(&detail_url(2), vec![Response::Page(detail_page(2, "Two"))])
        .respond(&detail_url(3), vec![Response::Page(detail_page(3, "Three"))]);

    let mut controller = controller(&session, settings(0));
    let run = controller.run_range(1, 2).await.unwrap();

    assert_eq!(run.records().len(), 3);
    assert_eq!(session.calls(&detail_url(2)), 1);
}

#[tokio::test]
async fn test_per_page_cap_limits_entries() {
    let session = ScriptedSession::default();
    session.respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2, 3, 4]))]);
    for id in 1..=4 {
        session.respond(&detail_url(id), vec![Response::Page(detail_page(id, "Item"))]);
    }

    let mut settings = settings(0);
    settings.per_page_cap = Some(2);
    let mut controller = controller(&session, settings);
    let run = controller.run_page(1).await.unwrap();

    let urls: Vec<&str> = run.records().iter().map(|r| r.source_url.as_str()).collect();
    assert_eq!(urls, vec![detail_url(1), detail_url(2)]);
    assert_eq!(session.calls(&detail_url(3)), 0);
    assert_eq!(run.per_page_cap, Some(2));
}

#[tokio::test]
async fn test_validate_never_extracts() {
    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2, 3]))])
        .respond(&listing_url(2), vec![Response::Page(blank_page())])
        .respond(&listing_url(3), vec![Response::Page(listing_page(&[4]))])
        .respond(&detail_url(1), vec![Response::Page(detail_page(1, "One"))]);

    let controller = controller(&session, settings(1));
    let report = controller.validate(1, 3).await.unwrap();

    assert_eq!(session.detail_calls(), 0);
    let links: Vec<usize> = report.pages.iter().map(|p| p.links).collect();
    assert_eq!(links, vec![3, 0, 1]);
    assert_eq!(report.total_links(), 4);
    assert!(report.has_data());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].page, Some(2));
}

#[tokio::test]
async fn test_validate_without_data() {
    let session = ScriptedSession::default();
    session.respond(&listing_url(1), vec![Response::Timeout]);

    let controller = controller(&session, settings(0));
    let report = controller.validate(1, 1).await.unwrap();
    assert!(!report.has_data());
}

#[tokio::test]
async fn test_invalid_ranges_are_rejected() {
    let session = ScriptedSession::default();
    let mut controller = controller(&session, settings(0));

    assert!(matches!(
        controller.run_range(3, 2).await,
        Err(HarvestError::Config(_))
    ));
    assert!(matches!(
        controller.run_page(0).await,
        Err(HarvestError::Config(_))
    ));
    assert!(controller.validate(0, 1).await.is_err());
    assert_eq!(session.calls(&listing_url(1)), 0);
}

fn failure_file_session() -> ScriptedSession {
    let session = ScriptedSession::default();
    session
        .respond(&detail_url(2), vec![Response::Page(detail_page(2, "Two"))])
        .respond(&detail_url(4), vec![Response::Fail])
        .respond(&listing_url(3), vec![Response::Page(listing_page(&[8]))])
        .respond(&detail_url(8), vec![Response::Page(detail_page(8, "Eight"))]);
    session
}

fn failure_file() -> Vec<FailureRecord> {
    vec![
        FailureRecord::new(detail_url(2), 3, Some("result rejected".to_string())),
        FailureRecord::new(detail_url(4), 3, None),
        FailureRecord::new(detail_url(2), 3, None),
        FailureRecord::new(listing_url(3), 3, None).for_page(3),
    ]
}

#[tokio::test]
async fn test_retry_failures_recovers_and_reports_residue() {
    let session = failure_file_session();
    let mut settings = settings(1);
    settings.first_id = 101;
    let mut controller = controller(&session, settings);

    let run = controller
        .retry_failures(failure_file(), PathBuf::from("failures.json"))
        .await
        .unwrap();

    let recovered: Vec<(u64, &str)> = run
        .records()
        .iter()
        .map(|r| (r.id, r.source_url.as_str()))
        .collect();
    assert_eq!(
        recovered,
        vec![(101, detail_url(2).as_str()), (102, detail_url(8).as_str())]
    );
    assert_eq!(session.calls(&detail_url(2)), 1);

    assert_eq!(run.failures().len(), 1);
    assert_eq!(run.failures()[0].url, detail_url(4));
    assert_eq!(run.failures()[0].attempts, 2);
}

#[tokio::test]
async fn test_retry_failures_is_repeatable() {
    let first = controller(&failure_file_session(), settings(1))
        .retry_failures(failure_file(), PathBuf::from("failures.json"))
        .await
        .unwrap();
    let second = controller(&failure_file_session(), settings(1))
        .retry_failures(failure_file(), PathBuf::from("failures.json"))
        .await
        .unwrap();

    let summarize = |run: &CrawlSession| -> Vec<(u64, String)> {
        run.records()
            .iter()
            .map(|r| (r.id, r.source_url.clone()))
            .collect()
    };
    assert_eq!(summarize(&first), summarize(&second));
    assert_eq!(first.failures().len(), second.failures().len());
}

#[tokio::test]
async fn test_retry_of_residual_file_skips_recovered_urls() {
    let session = failure_file_session();

    let first = controller(&session, settings(1))
        .retry_failures(failure_file(), PathBuf::from("failures.json"))
        .await
        .unwrap();
    assert_eq!(session.calls(&detail_url(2)), 1);

    let residual = first.failures().to_vec();
    let second = controller(&session, settings(1))
        .retry_failures(residual, PathBuf::from("failures.retry.json"))
        .await
        .unwrap();

    assert_eq!(session.calls(&detail_url(2)), 1);
    assert_eq!(session.calls(&detail_url(8)), 1);
    assert!(second.records().is_empty());
    assert_eq!(second.failures().len(), 1);
    assert_eq!(second.failures()[0].url, detail_url(4));
}

#[tokio::test]
async fn test_retry_flushes_keep_unattempted_failures() {
    let session = ScriptedSession::default();
    session
        .respond(&detail_url(2), vec![Response::Page(detail_page(2, "Two"))])
        .respond(&listing_url(3), vec![Response::Page(listing_page(&[8]))])
        .respond(&detail_url(8), vec![Response::Page(detail_page(8, "Eight"))]);

    let snapshots = FailureSnapshots::default();
    let mut controller =
        controller(&session, settings(1)).with_store(Box::new(snapshots.clone()));
    let run = controller
        .retry_failures(
            vec![
                FailureRecord::new(format!("{}/", detail_url(2)), 3, None),
                FailureRecord::new(listing_url(3), 3, None).for_page(3),
                FailureRecord::new(listing_url(4), 3, None).for_page(4),
            ],
            PathBuf::from("failures.json"),
        )
        .await
        .unwrap();

    let flushed = snapshots.taken();
    assert_eq!(flushed[0], vec![listing_url(3), listing_url(4)]);
    assert_eq!(flushed[1], vec![listing_url(4)]);
    for snapshot in &flushed {
        assert!(snapshot.contains(&listing_url(4)));
        assert!(!snapshot.contains(&detail_url(2)));
    }

    assert!(run.pending().is_empty());
    assert_eq!(run.failures().len(), 1);
    assert_eq!(run.failures()[0].page, Some(4));
    assert_eq!(run.failures()[0].attempts, 2);
    assert_eq!(run.records().len(), 2);
}

#[tokio::test]
async fn test_retry_failures_rejects_bad_url() {
    let session = ScriptedSession::default();
    let mut controller = controller(&session, settings(0));

    let result = controller
        .retry_failures(
            vec![FailureRecord::new("not a url", 1, None)],
            PathBuf::from("bad.json"),
        )
        .await;
    assert!(matches!(result, Err(HarvestError::FailureFile { .. })));
}

#[tokio::test]
async fn test_json_store_receives_records_and_failures() {
    let dir = TempDir::new().unwrap();
    let records_path = dir.path().join("out").join("records.jsonl");
    let failures_path = dir.path().join("out").join("failures.json");

    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2]))])
        .respond(&detail_url(1), vec![Response::Page(detail_page(1, "One"))])
        .respond(&detail_url(2), vec![Response::Fail]);

    let mut controller = controller(&session, settings(0)).with_store(Box::new(
        JsonRecordStore::new(&records_path, &failures_path, RecordFormat::Jsonl),
    ));
    let run = controller.run_page(1).await.unwrap();

    let records = load_records_file(&records_path).unwrap();
    assert_eq!(records, run.records());

    let failures = load_failure_file(&failures_path).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url, detail_url(2));
    assert_eq!(failures[0].attempts, 1);
}

#[tokio::test]
async fn test_pipeline_stops_at_first_sufficient_strategy() {
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));
    let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
        Box::new(CountingStrategy {
            calls: first_calls.clone(),
            fields: vec![("Title", "First"), ("Date", "1901")],
        }),
        Box::new(CountingStrategy {
            calls: second_calls.clone(),
            fields: vec![("Title", "Second"), ("Subject", "Maps")],
        }),
    ];
    let pipeline = ExtractionPipeline::new(
        Box::new(ContentDmRecognizer),
        strategies,
        ImageResolver::new(base_url()),
        AcceptancePolicy::default(),
        wait(),
    );

    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[1, 2]))])
        .respond(&detail_url(1), vec![Response::Page(blank_page())])
        .respond(&detail_url(2), vec![Response::Page(blank_page())]);

    let mut controller = CrawlController::new(
        Box::new(session.clone()),
        PageNavigator::new(base_url(), "/digital/search/page/{page}", wait()),
        pipeline,
        settings(0),
    );
    let run = controller.run_page(1).await.unwrap();

    assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(run.records()[0].title(), Some("First"));
    assert!(run.records()[0].get("Subject").is_none());
}

#[tokio::test]
async fn test_section_text_without_embedded_state() {
    let detail = r#"<html><body><div id="root">
        <nav>Home / Browse</nav>
        <pre>Item Description
Title (English): View of the Citadel
Creator: Pascal Sebah
Date: 1880</pre>
        </div></body></html>"#;

    let session = ScriptedSession::default();
    session
        .respond(&listing_url(1), vec![Response::Page(listing_page(&[3]))])
        .respond(&detail_url(3), vec![Response::Page(detail.to_string())]);

    let mut controller = controller(&session, settings(0));
    let run = controller.run_page(1).await.unwrap();

    assert_eq!(run.records().len(), 1);
    let record = &run.records()[0];
    assert_eq!(record.title(), Some("View of the Citadel"));
    assert_eq!(record.get("Creator"), Some("Pascal Sebah"));
    assert_eq!(record.get("Date"), Some("1880"));
}
