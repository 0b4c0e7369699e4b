//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The persistent priority frontier
//! - HTTP fetching with retry logic
//! - Term counting and link extraction
//! - Batched persistence of content records
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod persister;
mod priority;

pub use coordinator::{CrawlCounters, CrawlPhase, CrawlReport, Coordinator, RunOptions};
pub use extractor::{split_sentences, CandidateLink, Extraction, Extractor};
pub use fetcher::{
    build_http_client, FetchError, FetchOutcome, FetchedPage, Fetcher, RetryPolicy,
};
pub use frontier::{EnqueueOutcome, Frontier, FrontierCounts};
pub use persister::{FlushReport, PersistTotals, Persister};
pub use priority::{PriorityPolicy, CONTENT_PRIORITY, HIGH_VALUE_PRIORITY};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl with the default observer
///
/// # Example
///
/// ```no_run
/// use linkscout::config::load_config_with_hash;
/// use linkscout::crawler::{crawl, RunOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("linkscout.toml"))?;
/// let report = crawl(config, RunOptions { fresh: false, config_hash: Some(hash) }).await?;
/// println!("{} crawled", report.counters.crawled);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, options: RunOptions) -> Result<CrawlReport, CrawlError> {
    let mut coordinator = Coordinator::new(config, options)?;
    coordinator.run().await
}
