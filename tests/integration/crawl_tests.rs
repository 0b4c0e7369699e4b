//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use crate::support::{article, html_page, test_config};
use linkscout::crawler::{CrawlCounters, CrawlPhase, Coordinator, RunOptions};
use linkscout::output::CrawlObserver;
use linkscout::storage::{ContentRecord, RunStatus, SqliteStorage, Storage};
use linkscout::{CrawlError, CrawlReport, FrontierStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crawl_follows_in_scope_links_only() {
    let server = MockServer::start().await;
    let base = server.uri();
    let port = server.address().port();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(&format!(
            r#"<p>Read about the <a href="/news/b.html">stock market</a> rally.</p>
            <p>Elsewhere, see <a href="http://localhost:{}/c.html">this page</a>.</p>"#,
            port
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article("<p>Nothing to see here.</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c.html"))
        .respond_with(article("<p>Off-site.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&base, &db_path);

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(coordinator.phase(), CrawlPhase::Terminated);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.counters,
        CrawlCounters {
            crawled: 2,
            queued: 2,
            warnings: 0,
            errors: 0,
        }
    );
    assert_eq!(report.persisted.records_written, 2);

    let a = format!("{}/news/a.html", base);
    let b = format!("{}/news/b.html", base);
    let c = format!("http://localhost:{}/c.html", port);

    let frontier = coordinator.frontier();
    assert_eq!(
        frontier.get(&a).unwrap().unwrap().status,
        FrontierStatus::Crawled
    );
    let entry_b = frontier.get(&b).unwrap().unwrap();
    assert_eq!(entry_b.status, FrontierStatus::Crawled);
    assert_eq!(entry_b.depth, 1);
    assert!(frontier.get(&c).unwrap().is_none());

    let storage = SqliteStorage::new(&db_path).unwrap();
    let record = storage.get_content_record(&a).unwrap().unwrap();
    assert_eq!(record.occurrence_count, 1);
    assert_eq!(record.sentences_with_links, 1);
    assert_eq!(record.sentences_without_links, 0);

    let edges = storage.get_edges(record.id).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].anchor_text, "stock market");
    assert_eq!(edges[0].destination_url, b);

    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.totals.crawled, 2);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_lost_store_fails_the_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(
            r#"<p>The <a href="/news/b.html">stock market</a> fell.</p>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article("<p>Never reached.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut config = test_config(&base, &db_path);
    config.output.flush_size = 1;
    config.output.max_flush_failures = 1;

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let run_id = coordinator.run_id();

    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("ALTER TABLE content_records RENAME TO content_records_away;")
        .unwrap();

    let result = coordinator.run().await;
    assert!(
        matches!(result, Err(CrawlError::StoreUnavailable { failures: 1, .. })),
        "unexpected result: {:?}",
        result.map(|report| report.counters)
    );
    assert_eq!(coordinator.phase(), CrawlPhase::Terminated);

    let b = format!("{}/news/b.html", base);
    assert!(coordinator.frontier().get(&b).unwrap().is_none());

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());
    assert_eq!(storage.count_content_records().unwrap(), 0);
}

#[tokio::test]
async fn test_url_limit_stops_dispatching() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(
            r#"<p><a href="/p/1.html">One</a> <a href="/p/2.html">Two</a>
            <a href="/p/3.html">Three</a></p>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d\.html$"))
        .respond_with(article("<p>Leaf.</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut config = test_config(&base, &db_path);
    config.crawler.url_limit = 2;

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counters.crawled, 2);
    assert_eq!(report.counters.queued, 4);
    assert_eq!(report.frontier.pending, 2);
    assert_eq!(report.frontier.in_progress, 0);
}

#[tokio::test]
async fn test_failures_become_warnings_and_errors() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(
            r#"<p><a href="/news/gone.html">Gone</a> <a href="/news/broken.html">Broken</a>
            <a href="/files/report.pdf">Report</a></p>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/broken.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&base, &db_path);

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(
        report.counters,
        CrawlCounters {
            crawled: 3,
            queued: 4,
            warnings: 2,
            errors: 1,
        }
    );

    let frontier = coordinator.frontier();
    assert_eq!(
        frontier
            .get(&format!("{}/news/gone.html", base))
            .unwrap()
            .unwrap()
            .status,
        FrontierStatus::Crawled
    );
    assert_eq!(
        frontier
            .get(&format!("{}/news/broken.html", base))
            .unwrap()
            .unwrap()
            .status,
        FrontierStatus::Error
    );
    assert_eq!(report.persisted.records_written, 1);
}

#[tokio::test]
async fn test_page_without_content_region_is_a_warning() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(html_page(
            r#"<html><body><p>The stock market.</p><a href="/news/b.html">next</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article("<p>The stock market closed.</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&base, &db_path);

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counters.crawled, 2);
    assert_eq!(report.counters.warnings, 1);
    assert_eq!(report.persisted.records_written, 1);
    assert_eq!(report.link_opportunities, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert!(storage
        .get_content_record(&format!("{}/news/a.html", base))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_robots_disallowed_urls_are_never_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(
            r#"<p><a href="/private/x.html">Secret</a> <a href="/news/b.html">Open</a></p>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article("<p>Open.</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/x.html"))
        .respond_with(article("<p>Secret.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut config = test_config(&base, &db_path);
    config.crawler.respect_robots = true;

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counters.crawled, 3);
    assert_eq!(report.counters.warnings, 1);
    assert_eq!(
        coordinator
            .frontier()
            .get(&format!("{}/private/x.html", base))
            .unwrap()
            .unwrap()
            .status,
        FrontierStatus::Crawled
    );
}

#[tokio::test]
async fn test_max_depth_limits_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(r#"<p><a href="/news/b.html">B</a></p>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article(r#"<p><a href="/news/c.html">C</a></p>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/c.html"))
        .respond_with(article("<p>Too deep.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut config = test_config(&base, &db_path);
    config.crawler.max_depth = Some(1);

    let mut coordinator = Coordinator::new(config, RunOptions::default()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counters.crawled, 2);
    assert!(coordinator
        .frontier()
        .get(&format!("{}/news/c.html", base))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_second_run_resumes_pending_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article(r#"<p><a href="/news/b.html">B</a></p>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/b.html"))
        .respond_with(article("<p>B.</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");

    let mut config = test_config(&base, &db_path);
    config.crawler.url_limit = 1;
    let first = Coordinator::new(config, RunOptions::default())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.counters.crawled, 1);
    assert_eq!(first.frontier.pending, 1);

    let second = Coordinator::new(test_config(&base, &db_path), RunOptions::default())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.counters.crawled, 1);
    assert_eq!(second.counters.queued, 0);
    assert_eq!(second.frontier.crawled, 2);
}

#[derive(Default)]
struct RecordingObserver {
    started: AtomicBool,
    items: AtomicUsize,
    finished: AtomicBool,
}

impl CrawlObserver for RecordingObserver {
    fn on_start(&self, _run_id: i64, seeds: &[String]) {
        assert_eq!(seeds.len(), 1);
        self.started.store(true, Ordering::SeqCst);
    }

    fn on_item(&self, record: &ContentRecord) {
        assert!(record.url.ends_with("/news/a.html"));
        self.items.fetch_add(1, Ordering::SeqCst);
    }

    fn on_finish(&self, report: &CrawlReport) {
        assert_eq!(report.counters.crawled, 1);
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_observer_sees_lifecycle() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/news/a.html"))
        .respond_with(article("<p>The stock market and the Stock  Market.</p>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let observer = Arc::new(RecordingObserver::default());

    let mut coordinator = Coordinator::new(test_config(&base, &db_path), RunOptions::default())
        .unwrap()
        .with_observer(observer.clone());
    coordinator.run().await.unwrap();

    assert!(observer.started.load(Ordering::SeqCst));
    assert_eq!(observer.items.load(Ordering::SeqCst), 1);
    assert!(observer.finished.load(Ordering::SeqCst));

    let storage = SqliteStorage::new(&db_path).unwrap();
    let record = storage
        .get_content_record(&format!("{}/news/a.html", base))
        .unwrap()
        .unwrap();
    assert_eq!(record.occurrence_count, 2);
    assert_eq!(record.sentences_without_links, 1);
}
