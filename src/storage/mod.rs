//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The frontier queue and its atomic claim
//! - Batched content record and link edge writes
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::FrontierStatus;
use crate::CrawlError;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared by the frontier and the persister within one process
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (creating if needed) a database and wraps it for sharing
pub fn open_storage(path: &Path) -> Result<SharedStorage, CrawlError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks the shared storage, reporting a poisoned lock as a storage error
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// A URL in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub id: i64,
    pub url: String,
    pub priority: u32,
    pub depth: u32,
    pub status: FrontierStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A link found in a sentence mentioning the search term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkEdge {
    pub anchor_text: String,
    pub destination_url: String,
}

/// Per-article measurement produced by the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub url: String,
    pub occurrence_count: u32,
    pub sentences_without_links: u32,
    pub sentences_with_links: u32,
    pub edges: Vec<LinkEdge>,
}

/// A content record as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub url: String,
    pub occurrence_count: u32,
    pub sentences_without_links: u32,
    pub sentences_with_links: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome of writing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWrite {
    /// Records inserted, or updated under the update policy
    pub records_written: usize,
    /// Records left untouched because the URL was already stored
    pub records_ignored: usize,
    /// Edges inserted (duplicates are not counted)
    pub edges_written: usize,
    /// Edges of ignored records, left out with them
    pub edges_skipped: usize,
}

/// Final counters stored on a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub crawled: u64,
    pub queued: u64,
    pub warnings: u64,
    pub errors: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
