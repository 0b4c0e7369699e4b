//! Shared fixtures for the integration tests

use linkscout::config::{parse_config, Config};
use std::path::Path;
use wiremock::ResponseTemplate;

/// A crawl configuration scoped to a local mock server
///
/// Robots checks are off, retries are fast and the crawl stops on the first
/// empty poll.
pub fn test_config(base_url: &str, db_path: &Path) -> Config {
    parse_config(&format!(
        r#"
[crawler]
batch-size = 5
concurrent-tasks = 4
request-timeout = 2000
max-redirects = 3
max-attempts = 2
retry-base-delay = 10
retry-max-delay = 20
url-limit = 50
poll-interval = 10
max-empty-polls = 1
respect-robots = false

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[scope]
seeds = ["{base}/news/a.html"]
allowed-hosts = ["127.0.0.1"]

[extract]
search-string = "stock market"

[output]
database-path = '{db}'
flush-size = 10
"#,
        base = base_url,
        db = db_path.display()
    ))
    .expect("test config should be valid")
}

/// A 200 response carrying an HTML document
pub fn html_page(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

/// An article page whose content region holds `region`
pub fn article(region: &str) -> ResponseTemplate {
    html_page(format!(
        r#"<html><head><title>Article</title></head><body>
        <h1>Markets</h1>
        <div class="caas-body">{}</div>
        </body></html>"#,
        region
    ))
}
