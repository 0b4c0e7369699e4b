//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::config::ConflictPolicy;
use crate::state::FrontierStatus;
use crate::storage::{
    BatchWrite, ContentRecord, FrontierEntry, LinkEdge, RunRecord, RunStatus,
    RunTotals, StoredRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("URL not in frontier: {0}")]
    UrlNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid frontier transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: FrontierStatus,
        to: FrontierStatus,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method that changes more than one row does so in a single
/// transaction; callers never see half of a claim or half of a batch.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stamps the finish time, final status and counters on a run
    fn complete_run(&mut self, run_id: i64, status: RunStatus, totals: RunTotals)
        -> StorageResult<()>;

    // ===== Frontier =====

    /// Inserts a URL unless it is already present
    ///
    /// Returns `true` when a row was inserted.
    fn insert_frontier_url(&mut self, url: &str, priority: u32, depth: u32) -> StorageResult<bool>;

    /// Atomically moves up to `limit` pending entries to in-progress
    ///
    /// Entries come back ordered by priority, then age. Concurrent callers,
    /// including other processes on the same database, never receive the
    /// same entry.
    fn claim_pending(&mut self, limit: usize) -> StorageResult<Vec<FrontierEntry>>;

    /// Moves an entry from `from` to `to`, failing if it is not in `from`
    fn transition_status(
        &mut self,
        url: &str,
        from: FrontierStatus,
        to: FrontierStatus,
    ) -> StorageResult<()>;

    /// Gets a frontier entry by URL
    fn get_frontier_entry(&self, url: &str) -> StorageResult<Option<FrontierEntry>>;

    /// Number of frontier entries with the given status
    fn count_by_status(&self, status: FrontierStatus) -> StorageResult<u64>;

    /// Resets every entry in `from` back to pending; returns how many moved
    fn requeue(&mut self, from: FrontierStatus) -> StorageResult<usize>;

    /// Removes all frontier entries and recorded parameters
    fn clear_frontier(&mut self) -> StorageResult<()>;

    // ===== Parameters =====

    /// Records a stripped query string for a URL; returns `true` if new
    fn insert_parameters(&mut self, url: &str, raw: &str, key_count: usize)
        -> StorageResult<bool>;

    /// Number of distinct URLs seen with query parameters
    fn count_parameterized_urls(&self) -> StorageResult<u64>;

    // ===== Content =====

    /// Writes records, then their edges, in one transaction
    ///
    /// Edges follow the version of a record that the policy keeps: under
    /// `Ignore` an already-stored record's new edges are skipped, under
    /// `Update` its previous edges are replaced.
    fn write_batch(
        &mut self,
        records: &[ContentRecord],
        policy: ConflictPolicy,
    ) -> StorageResult<BatchWrite>;

    /// Gets a stored content record by URL
    fn get_content_record(&self, url: &str) -> StorageResult<Option<StoredRecord>>;

    /// Edges of a stored record, in insertion order
    fn get_edges(&self, record_id: i64) -> StorageResult<Vec<LinkEdge>>;

    // ===== Statistics =====

    fn count_content_records(&self) -> StorageResult<u64>;

    fn count_link_edges(&self) -> StorageResult<u64>;

    /// Records with at least one term-bearing sentence that has no link
    fn count_link_opportunities(&self) -> StorageResult<u64>;

    /// Sum of search term occurrences over all records
    fn total_occurrences(&self) -> StorageResult<u64>;
}
