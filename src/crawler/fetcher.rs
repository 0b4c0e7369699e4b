//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Bounding concurrent requests with a shared semaphore
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::CrawlError;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

/// Upper bound on the TCP/TLS connect phase, independent of the request timeout
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a fetch did not produce a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server error: HTTP {0}")]
    Server(u16),

    #[error("rate limited: HTTP 429")]
    RateLimited,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("unexpected status: HTTP {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Transient errors are retried until the attempt budget runs out
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::Server(_) | Self::RateLimited | Self::Body(_)
        )
    }

    /// Errors that end the URL without counting as a crawl error
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::TooManyRedirects)
    }
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

impl FetchedPage {
    /// Missing Content-Type is treated as HTML
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            }
            None => true,
        }
    }
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response with its body
    Content(FetchedPage),

    /// HTTP 404; never retried
    NotFound { attempts: u32 },

    /// Any other failure, after retries where they apply
    Failed { error: FetchError, attempts: u32 },
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per URL, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay),
            max_delay: Duration::from_millis(config.retry_max_delay),
        }
    }

    /// Sleep after the `failed_attempt`-th attempt: `base * 2^(n-1)`, capped
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent reads `Name/Version (+ContactURL; ContactEmail)`.
/// Redirects are followed up to `max-redirects`; one more makes the request
/// fail with [`FetchError::TooManyRedirects`].
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );
    let timeout = Duration::from_millis(crawler.request_timeout);

    Client::builder()
        .user_agent(agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .redirect(Policy::limited(crawler.max_redirects as usize))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages under a shared concurrency limit
///
/// A semaphore permit is held only for the duration of one HTTP attempt.
/// Backoff sleeps and everything the caller does with the body happen
/// without a permit.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

enum Attempt {
    Page(FetchedPage),
    NotFound,
}

impl Fetcher {
    pub fn new(client: Client, permits: Arc<Semaphore>, retry: RetryPolicy) -> Self {
        Self {
            client,
            permits,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let permits = Arc::new(Semaphore::new(config.crawler.concurrent_tasks as usize));
        Ok(Self::new(
            client,
            permits,
            RetryPolicy::from_config(&config.crawler),
        ))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Content |
    /// | HTTP 404 | NotFound after one attempt |
    /// | HTTP 429, 5xx | Retry with backoff, then Failed |
    /// | Timeout, connect error, body read error | Retry with backoff, then Failed |
    /// | Redirect chain over the limit | Failed immediately |
    /// | Other status | Failed immediately |
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.attempt(url).await {
                Ok(Attempt::Page(mut page)) => {
                    page.attempts = attempt;
                    return FetchOutcome::Content(page);
                }
                Ok(Attempt::NotFound) => {
                    return FetchOutcome::NotFound { attempts: attempt };
                }
                Err(error) if error.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return FetchOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<Attempt, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Request("fetch semaphore closed".to_string()))?;

        let response = self.client.get(url).send().await.map_err(classify_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Attempt::NotFound);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status.is_server_error() {
            return Err(FetchError::Server(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        Ok(Attempt::Page(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            attempts: 0,
        }))
    }
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_redirect() {
        FetchError::TooManyRedirects
    } else if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}
