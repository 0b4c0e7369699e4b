//! Per-origin robots.txt cache
//!
//! Entries expire after 24 hours and are fetched again on next use.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::{origin_key, robots_url};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use url::Url;

/// Parsed robots.txt for one origin and when it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Shared robots.txt lookups for all crawl tasks
///
/// Two tasks racing on an uncached origin may both fetch its robots.txt;
/// the later result wins.
pub struct RobotsCache {
    client: Client,
    permits: Arc<Semaphore>,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// `permits` is the page fetcher's semaphore, so robots.txt requests
    /// count against the same concurrency limit. `user_agent` is the product
    /// token matched against `User-agent` lines.
    pub fn new(client: Client, permits: Arc<Semaphore>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            permits,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL against its origin's robots.txt, fetching it when needed
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(key) = origin_key(url) else {
            return true;
        };

        if let Some(cached) = self.cached(&key) {
            return cached.is_allowed(url.as_str(), &self.user_agent);
        }

        let robots = match robots_url(url) {
            Some(location) => fetch_robots(&self.client, &self.permits, &location).await,
            None => ParsedRobots::allow_all(),
        };
        let allowed = robots.is_allowed(url.as_str(), &self.user_agent);

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, CachedRobots::new(robots));
        }
        allowed
    }

    fn cached(&self, key: &str) -> Option<ParsedRobots> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.content.clone())
    }
}
