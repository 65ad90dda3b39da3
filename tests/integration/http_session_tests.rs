//! Integration tests for the HTTP session backend
//!
//! These tests use wiremock to create mock catalog servers and check both the
//! session itself and a full harvest driven over real HTTP.

use catalog_harvester::config::{Backend, Config};
use catalog_harvester::crawler::CrawlController;
use catalog_harvester::session::{open_session, BrowserSession, HttpSession, RenderWait, SessionError};
use catalog_harvester::storage::{load_failure_file, load_records_file, open_stores};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn wait() -> RenderWait {
    RenderWait::new("#root", Duration::from_secs(5), Duration::ZERO)
}

fn test_config(base_url: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.base_url = base_url.to_string();
    config.browser.backend = Backend::Http;
    config.browser.listing_settle_ms = 0;
    config.browser.detail_settle_ms = 0;
    config.browser.render_timeout_secs = 5;
    config.crawl.entry_delay_ms = 0;
    config.crawl.page_delay_ms = 0;
    config.retry.max_retries = 1;
    config.retry.retry_delay_ms = 0;
    config.output.records_path = dir.path().join("records.jsonl").display().to_string();
    config.output.failures_path = dir.path().join("failures.json").display().to_string();
    config.output.database_path = Some(dir.path().join("harvest.db").display().to_string());
    config
}

fn detail_html(title: &str, creator: &str) -> String {
    format!(
        r#"<html><body><div id="root">
        <h2>Item Description</h2>
        <dl><dt>Title</dt><dd>{}</dd><dt>Creator</dt><dd>{}</dd></dl>
        <div class="item-image"><img src="/iiif/2/coll:1/full/full/0/default.jpg"></div>
        </div></body></html>"#,
        title, creator
    )
}

#[tokio::test]
async fn test_render_returns_source_with_marker() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/digital/search/page/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<div id="root"><p>ok</p></div>"#),
        )
        .mount(&mock_server)
        .await;

    let session = HttpSession::new(&Config::default().browser).unwrap();
    let url = Url::parse(&format!("{}/digital/search/page/1", mock_server.uri())).unwrap();

    let source = session.render(&url, &wait()).await.unwrap();
    assert!(source.contains("<p>ok</p>"));
}

#[tokio::test]
async fn test_render_without_marker_is_render_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shell"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Loading</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let session = HttpSession::new(&Config::default().browser).unwrap();
    let url = Url::parse(&format!("{}/shell", mock_server.uri())).unwrap();

    let err = session.render(&url, &wait()).await.unwrap_err();
    assert!(err.is_render_timeout());
}

#[tokio::test]
async fn test_render_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let session = HttpSession::new(&Config::default().browser).unwrap();
    let url = Url::parse(&format!("{}/busy", mock_server.uri())).unwrap();

    match session.render(&url, &wait()).await {
        Err(SessionError::Status { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_harvest_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/digital/search/page/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div id="root">
            <a href="/digital/collection/coll/id/1">First</a>
            <a href="/digital/collection/coll/id/2">Second</a>
            <a href="/digital/collection/coll/id/3">Third</a>
            </div></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/digital/collection/coll/id/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(detail_html("Map of Cairo", "Survey Dept.")),
        )
        .mount(&mock_server)
        .await;

    // Second item fails once before it renders
    Mock::given(method("GET"))
        .and(path("/digital/collection/coll/id/2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/digital/collection/coll/id/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(detail_html("Nile Delta", "Unknown")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/digital/collection/coll/id/3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = test_config(&base_url, &dir);
    let browser = open_session(&config.browser).await.unwrap();
    let mut controller = CrawlController::from_config(&config, browser).unwrap();
    for store in open_stores(&config, "test-hash").unwrap() {
        controller.add_store(store);
    }

    let run = controller.run_page(1).await.unwrap();
    controller.shutdown().await.unwrap();

    let titles: Vec<&str> = run.records().iter().filter_map(|r| r.title()).collect();
    assert_eq!(titles, vec!["Map of Cairo", "Nile Delta"]);
    assert_eq!(run.records()[0].id, 1);
    assert_eq!(run.records()[1].id, 2);
    assert_eq!(
        run.records()[0].get("Image URL"),
        Some(format!("{}/iiif/2/coll:1/full/full/0/default.jpg", base_url).as_str())
    );

    assert_eq!(run.failures().len(), 1);
    assert_eq!(
        run.failures()[0].url,
        format!("{}/digital/collection/coll/id/3", base_url)
    );
    assert_eq!(run.failures()[0].attempts, 2);

    let records = load_records_file(dir.path().join("records.jsonl").as_path()).unwrap();
    assert_eq!(records.len(), 2);
    let failures = load_failure_file(dir.path().join("failures.json").as_path()).unwrap();
    assert_eq!(failures.len(), 1);
    assert!(dir.path().join("harvest.db").exists());
}
