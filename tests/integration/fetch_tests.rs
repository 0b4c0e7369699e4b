//! Fetcher behavior against a mock server: retries, terminal statuses, redirects

use crate::support::{html_page, test_config};
use linkscout::crawler::{FetchError, FetchOutcome, Fetcher};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer, configure: impl FnOnce(&mut linkscout::Config)) -> Fetcher {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir.path().join("unused.db"));
    configure(&mut config);
    Fetcher::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_timeout_is_retried_exactly_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow.html"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_millis(800)))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |config| {
        config.crawler.request_timeout = 200;
        config.crawler.max_attempts = 3;
    });

    let outcome = fetcher.fetch(&format!("{}/slow.html", server.uri())).await;
    match outcome {
        FetchOutcome::Failed { error, attempts } => {
            assert_eq!(error, FetchError::Timeout);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected a timeout failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_is_attempted_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |config| config.crawler.max_attempts = 5);

    let outcome = fetcher.fetch(&format!("{}/gone.html", server.uri())).await;
    assert!(matches!(outcome, FetchOutcome::NotFound { attempts: 1 }));
}

#[tokio::test]
async fn test_server_error_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.html"))
        .respond_with(html_page("<p>recovered</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |config| config.crawler.max_attempts = 3);

    match fetcher.fetch(&format!("{}/flaky.html", server.uri())).await {
        FetchOutcome::Content(page) => {
            assert_eq!(page.attempts, 2);
            assert_eq!(page.status_code, 200);
            assert!(page.is_html());
            assert!(page.body.contains("recovered"));
        }
        other => panic!("expected content, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy.html"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |_| {});

    let outcome = fetcher.fetch(&format!("{}/busy.html", server.uri())).await;
    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::RateLimited,
            attempts: 2
        }
    ));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private.html"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |config| config.crawler.max_attempts = 4);

    let outcome = fetcher.fetch(&format!("{}/private.html", server.uri())).await;
    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::Status(403),
            attempts: 1
        }
    ));
}

#[tokio::test]
async fn test_redirect_chain_over_limit() {
    let server = MockServer::start().await;

    for hop in 1..=5 {
        let next = format!("/hop/{}", hop + 1);
        Mock::given(method("GET"))
            .and(path(format!("/hop/{}", hop)))
            .respond_with(ResponseTemplate::new(302).insert_header("location", next.as_str()))
            .mount(&server)
            .await;
    }

    let fetcher = fetcher(&server, |config| config.crawler.max_redirects = 2);

    let outcome = fetcher.fetch(&format!("{}/hop/1", server.uri())).await;
    match outcome {
        FetchOutcome::Failed { error, attempts } => {
            assert_eq!(error, FetchError::TooManyRedirects);
            assert!(error.is_skip());
            assert_eq!(attempts, 1);
        }
        other => panic!("expected too many redirects, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_within_limit_reports_final_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old.html"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new.html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new.html"))
        .respond_with(html_page("<p>moved</p>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server, |_| {});

    match fetcher.fetch(&format!("{}/old.html", server.uri())).await {
        FetchOutcome::Content(page) => {
            assert_eq!(page.final_url.path(), "/new.html");
            assert_eq!(page.attempts, 1);
        }
        other => panic!("expected content, got {:?}", other),
    }
}
