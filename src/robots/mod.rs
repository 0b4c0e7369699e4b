//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! A robots.txt that cannot be fetched, or answers with anything but 200,
//! allows everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use url::Url;

/// Fetches and parses the robots.txt at `location`
///
/// The request and body read hold one of the crawl's fetch permits.
/// Never fails; every error degrades to [`ParsedRobots::allow_all`].
pub async fn fetch_robots(client: &Client, permits: &Semaphore, location: &Url) -> ParsedRobots {
    let Ok(_permit) = permits.acquire().await else {
        tracing::debug!("Fetch semaphore closed before {}", location);
        return ParsedRobots::allow_all();
    };

    let response = match client.get(location.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", location, e);
            return ParsedRobots::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!("{} answered {}, allowing all", location, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Fetched {} ({} bytes)", location, body.len());
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::debug!("Failed to read {}: {}", location, e);
            ParsedRobots::allow_all()
        }
    }
}
