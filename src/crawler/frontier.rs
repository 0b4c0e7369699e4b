//! Persistent crawl frontier
//!
//! The frontier is a priority queue kept in the database rather than in
//! memory, so that:
//! - a URL is queued at most once, ever (the URL column is unique)
//! - a crawl can be resumed after a crash
//! - several workers or processes can share one queue without claiming the
//!   same URL twice (claims run in an immediate transaction)

use crate::crawler::priority::PriorityPolicy;
use crate::state::FrontierStatus;
use crate::storage::{lock_storage, FrontierEntry, SharedStorage, Storage, StorageError};
use crate::url::CanonicalUrl;
use crate::CrawlError;

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    AlreadyExists,
}

/// Entry counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub crawled: u64,
    pub error: u64,
}

impl FrontierCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.crawled + self.error
    }
}

/// Store-backed priority queue of URLs to crawl
#[derive(Clone)]
pub struct Frontier {
    storage: SharedStorage,
    policy: PriorityPolicy,
}

impl Frontier {
    pub fn new(storage: SharedStorage, policy: PriorityPolicy) -> Self {
        Self { storage, policy }
    }

    /// Queues a URL with the priority the policy assigns it
    pub fn enqueue(&self, url: &CanonicalUrl, depth: u32) -> Result<EnqueueOutcome, CrawlError> {
        let priority = self.policy.priority(url.as_url());
        self.enqueue_with_priority(url.as_str(), depth, priority)
    }

    /// Queues a URL with an explicit priority
    ///
    /// The URL must already be canonical.
    pub fn enqueue_with_priority(
        &self,
        url: &str,
        depth: u32,
        priority: u32,
    ) -> Result<EnqueueOutcome, CrawlError> {
        let inserted = lock_storage(&self.storage)?.insert_frontier_url(url, priority, depth)?;
        if inserted {
            tracing::trace!(url, priority, depth, "Queued");
            Ok(EnqueueOutcome::Inserted)
        } else {
            Ok(EnqueueOutcome::AlreadyExists)
        }
    }

    /// Records the query string stripped from a canonical URL, if it had one
    pub fn record_parameters(&self, url: &CanonicalUrl) -> Result<bool, CrawlError> {
        match url.params() {
            Some(raw) => Ok(lock_storage(&self.storage)?.insert_parameters(
                url.as_str(),
                raw,
                url.param_key_count(),
            )?),
            None => Ok(false),
        }
    }

    /// Claims up to `max` pending entries, highest priority and oldest first
    ///
    /// An empty result means the frontier is drained for now; other workers
    /// may still be adding URLs.
    pub fn dequeue_batch(&self, max: usize) -> Result<Vec<FrontierEntry>, CrawlError> {
        Ok(lock_storage(&self.storage)?.claim_pending(max)?)
    }

    pub fn mark_crawled(&self, url: &str) -> Result<(), CrawlError> {
        self.finish(url, FrontierStatus::Crawled)
    }

    pub fn mark_error(&self, url: &str) -> Result<(), CrawlError> {
        self.finish(url, FrontierStatus::Error)
    }

    fn finish(&self, url: &str, to: FrontierStatus) -> Result<(), CrawlError> {
        let result = lock_storage(&self.storage)?.transition_status(
            url,
            FrontierStatus::InProgress,
            to,
        );

        match result {
            Ok(()) => Ok(()),
            Err(StorageError::InvalidTransition { url, from, to }) => {
                Err(CrawlError::InvalidTransition { url, from, to })
            }
            Err(StorageError::UrlNotFound(url)) => Err(CrawlError::UnknownUrl(url)),
            Err(e) => Err(e.into()),
        }
    }

    /// Operator reset: moves every entry in `from` back to pending
    ///
    /// Only `Error` and stale `InProgress` entries can be requeued.
    pub fn requeue(&self, from: FrontierStatus) -> Result<usize, CrawlError> {
        let moved = lock_storage(&self.storage)?.requeue(from)?;
        tracing::info!("Requeued {} {} entries", moved, from);
        Ok(moved)
    }

    pub fn get(&self, url: &str) -> Result<Option<FrontierEntry>, CrawlError> {
        Ok(lock_storage(&self.storage)?.get_frontier_entry(url)?)
    }

    pub fn counts(&self) -> Result<FrontierCounts, CrawlError> {
        let storage = lock_storage(&self.storage)?;
        Ok(FrontierCounts {
            pending: storage.count_by_status(FrontierStatus::Pending)?,
            in_progress: storage.count_by_status(FrontierStatus::InProgress)?,
            crawled: storage.count_by_status(FrontierStatus::Crawled)?,
            error: storage.count_by_status(FrontierStatus::Error)?,
        })
    }
}
