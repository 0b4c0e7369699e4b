use serde::Deserialize;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub scope: ScopeConfig,
    pub extract: ExtractConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
///
/// All durations are in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of frontier entries claimed per dequeue
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum number of HTTP requests in flight
    #[serde(rename = "concurrent-tasks", default = "default_concurrent_tasks")]
    pub concurrent_tasks: u32,

    /// Per-request timeout
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Redirects followed before a fetch is abandoned
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Attempts per URL, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on each further attempt
    #[serde(rename = "retry-base-delay", default = "default_retry_base_delay")]
    pub retry_base_delay: u64,

    /// Upper bound on a single backoff sleep
    #[serde(rename = "retry-max-delay", default = "default_retry_max_delay")]
    pub retry_max_delay: u64,

    /// Maximum number of URLs dispatched in one run
    #[serde(rename = "url-limit")]
    pub url_limit: u64,

    /// Sleep between polls of an empty frontier
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Consecutive empty polls before the crawl terminates
    #[serde(rename = "max-empty-polls", default = "default_max_empty_polls")]
    pub max_empty_polls: u32,

    /// Discovered links deeper than this are not enqueued
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Check robots.txt before fetching
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Which hosts the crawl starts from and may visit
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Seed URLs, enqueued at depth 0
    pub seeds: Vec<String>,

    /// Host patterns (e.g., "example.com" or "*.example.com")
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,

    /// Host patterns that are never visited, even when allowed
    #[serde(rename = "denied-hosts", default)]
    pub denied_hosts: Vec<String>,
}

/// What to measure on each article page
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Term counted as a whole word, case-insensitively
    #[serde(rename = "search-string")]
    pub search_string: String,

    /// CSS selector of the article body
    #[serde(rename = "content-selector", default = "default_content_selector")]
    pub content_selector: String,

    /// Elements inside the body whose text is ignored
    #[serde(rename = "skip-tags", default = "default_skip_tags")]
    pub skip_tags: Vec<String>,
}

/// Frontier priority bands
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityConfig {
    /// Path suffixes of article pages (band 0)
    #[serde(rename = "content-suffixes", default = "default_content_suffixes")]
    pub content_suffixes: Vec<String>,

    /// Path fragments of high-value sections (band 1)
    #[serde(rename = "high-value-paths", default = "default_high_value_paths")]
    pub high_value_paths: Vec<String>,

    /// Trending keywords anywhere in the URL (band 1)
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Lowest band a URL can fall into by depth
    #[serde(rename = "max-depth-band", default = "default_max_depth_band")]
    pub max_depth_band: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            content_suffixes: default_content_suffixes(),
            high_value_paths: default_high_value_paths(),
            keywords: default_keywords(),
            max_depth_band: default_max_depth_band(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Buffered records that trigger a flush
    #[serde(rename = "flush-size", default = "default_flush_size")]
    pub flush_size: u32,

    /// What happens when a record for an already stored URL is flushed
    #[serde(rename = "on-conflict", default)]
    pub on_conflict: ConflictPolicy,

    /// Consecutive failed flushes before the store is considered unavailable
    #[serde(rename = "max-flush-failures", default = "default_max_flush_failures")]
    pub max_flush_failures: u32,
}

/// Conflict policy for content records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the first stored record
    #[default]
    Ignore,
    /// Overwrite the stored counts with the latest ones
    Update,
}

fn default_batch_size() -> u32 {
    50
}

fn default_concurrent_tasks() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_redirects() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1_000
}

fn default_retry_max_delay() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    1_000
}

fn default_max_empty_polls() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_content_selector() -> String {
    "div.caas-body".to_string()
}

fn default_skip_tags() -> Vec<String> {
    vec!["h1".to_string(), "h2".to_string()]
}

fn default_content_suffixes() -> Vec<String> {
    vec![".html".to_string()]
}

fn default_high_value_paths() -> Vec<String> {
    ["/live/", "/quote/", "/horoscope/", "/weather/", "/games/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_keywords() -> Vec<String> {
    [
        "prime-day",
        "election",
        "black-friday",
        "stock-market",
        "dow-jones",
        "super-bowl",
        "congress",
        "senate",
        "cyber-monday",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_depth_band() -> u32 {
    6
}

fn default_flush_size() -> u32 {
    100
}

fn default_max_flush_failures() -> u32 {
    3
}
