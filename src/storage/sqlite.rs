//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::ConflictPolicy;
use crate::state::FrontierStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BatchWrite, ContentRecord, FrontierEntry, LinkEdge, RunRecord, RunStatus,
    RunTotals, StoredRecord,
};
use crate::CrawlError;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits on another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const FRONTIER_COLUMNS: &str = "id, url, priority, depth, status, created_at, updated_at";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, crawled, queued, warnings, errors";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// Several connections (threads or processes) may open the same file;
    /// writers wait on each other for up to five seconds.
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

/// Timestamps sort lexically: fixed microsecond width, always UTC
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn frontier_entry_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    let status: String = row.get(4)?;
    Ok(FrontierEntry {
        id: row.get(0)?,
        url: row.get(1)?,
        priority: row.get(2)?,
        depth: row.get(3)?,
        status: FrontierStatus::from_db_string(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown frontier status '{}'", status).into(),
            )
        })?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        totals: RunTotals {
            crawled: row.get::<_, i64>(5)? as u64,
            queued: row.get::<_, i64>(6)? as u64,
            warnings: row.get::<_, i64>(7)? as u64,
            errors: row.get::<_, i64>(8)? as u64,
        },
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now(), config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: RunTotals,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs
             SET finished_at = ?1, status = ?2, crawled = ?3, queued = ?4, warnings = ?5, errors = ?6
             WHERE id = ?7",
            params![
                now(),
                status.to_db_string(),
                totals.crawled as i64,
                totals.queued as i64,
                totals.warnings as i64,
                totals.errors as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Frontier =====

    fn insert_frontier_url(&mut self, url: &str, priority: u32, depth: u32) -> StorageResult<bool> {
        let ts = now();
        let inserted = self.conn.execute(
            "INSERT INTO frontier (url, priority, depth, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(url) DO NOTHING",
            params![url, priority, depth, FrontierStatus::Pending.to_db_string(), ts],
        )?;
        Ok(inserted == 1)
    }

    fn claim_pending(&mut self, limit: usize) -> StorageResult<Vec<FrontierEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // IMMEDIATE takes the write lock up front, so the select and the
        // update below cannot interleave with another claimer.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut claimed = {
            let mut stmt = tx.prepare(&format!(
                "UPDATE frontier
                 SET status = ?1, updated_at = ?2
                 WHERE id IN (
                     SELECT id FROM frontier
                     WHERE status = ?3
                     ORDER BY priority ASC, created_at ASC, id ASC
                     LIMIT ?4
                 )
                 RETURNING {}",
                FRONTIER_COLUMNS
            ))?;
            let rows = stmt.query_map(
                params![
                    FrontierStatus::InProgress.to_db_string(),
                    now(),
                    FrontierStatus::Pending.to_db_string(),
                    limit as i64
                ],
                frontier_entry_from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.commit()?;

        // RETURNING yields rows in no particular order.
        claimed.sort_by(|a, b| {
            (a.priority, &a.created_at, a.id).cmp(&(b.priority, &b.created_at, b.id))
        });
        Ok(claimed)
    }

    fn transition_status(
        &mut self,
        url: &str,
        from: FrontierStatus,
        to: FrontierStatus,
    ) -> StorageResult<()> {
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition {
                url: url.to_string(),
                from,
                to,
            });
        }

        let updated = self.conn.execute(
            "UPDATE frontier SET status = ?1, updated_at = ?2 WHERE url = ?3 AND status = ?4",
            params![to.to_db_string(), now(), url, from.to_db_string()],
        )?;
        if updated == 1 {
            return Ok(());
        }

        match self.get_frontier_entry(url)? {
            Some(entry) => Err(StorageError::InvalidTransition {
                url: url.to_string(),
                from: entry.status,
                to,
            }),
            None => Err(StorageError::UrlNotFound(url.to_string())),
        }
    }

    fn get_frontier_entry(&self, url: &str) -> StorageResult<Option<FrontierEntry>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM frontier WHERE url = ?1", FRONTIER_COLUMNS),
                params![url],
                frontier_entry_from_row,
            )
            .optional()?)
    }

    fn count_by_status(&self, status: FrontierStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn requeue(&mut self, from: FrontierStatus) -> StorageResult<usize> {
        if !from.can_requeue() {
            return Err(StorageError::InvalidTransition {
                url: "*".to_string(),
                from,
                to: FrontierStatus::Pending,
            });
        }
        Ok(self.conn.execute(
            "UPDATE frontier SET status = ?1, updated_at = ?2 WHERE status = ?3",
            params![
                FrontierStatus::Pending.to_db_string(),
                now(),
                from.to_db_string()
            ],
        )?)
    }

    fn clear_frontier(&mut self) -> StorageResult<()> {
        self.conn
            .execute_batch("DELETE FROM frontier; DELETE FROM url_parameters;")?;
        Ok(())
    }

    // ===== Parameters =====

    fn insert_parameters(
        &mut self,
        url: &str,
        raw: &str,
        key_count: usize,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO url_parameters (url, raw_parameters, key_count, more_than_three, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url, raw_parameters) DO NOTHING",
            params![url, raw, key_count as i64, key_count > 3, now()],
        )?;
        Ok(inserted == 1)
    }

    fn count_parameterized_urls(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(DISTINCT url) FROM url_parameters")
    }

    // ===== Content =====

    fn write_batch(
        &mut self,
        records: &[ContentRecord],
        policy: ConflictPolicy,
    ) -> StorageResult<BatchWrite> {
        let tx = self.conn.transaction()?;
        let mut report = BatchWrite::default();

        {
            let ts = now();
            let upsert_sql = match policy {
                ConflictPolicy::Ignore => {
                    "INSERT INTO content_records
                         (url, occurrence_count, sentences_without_links, sentences_with_links, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(url) DO NOTHING
                     RETURNING id"
                }
                ConflictPolicy::Update => {
                    "INSERT INTO content_records
                         (url, occurrence_count, sentences_without_links, sentences_with_links, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(url) DO UPDATE SET
                         occurrence_count = excluded.occurrence_count,
                         sentences_without_links = excluded.sentences_without_links,
                         sentences_with_links = excluded.sentences_with_links,
                         updated_at = excluded.updated_at
                     RETURNING id"
                }
            };

            let mut upsert = tx.prepare(upsert_sql)?;
            let mut clear_edges = tx.prepare("DELETE FROM link_edges WHERE source_record_id = ?1")?;
            let mut insert_edge = tx.prepare(
                "INSERT INTO link_edges (source_record_id, anchor_text, destination_url)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(source_record_id, anchor_text, destination_url) DO NOTHING",
            )?;

            // Records first; each record's edges follow the version that was kept.
            let mut written: Vec<(i64, &ContentRecord)> = Vec::with_capacity(records.len());
            let mut replaced: HashSet<i64> = HashSet::new();
            for record in records {
                let id: Option<i64> = upsert
                    .query_row(
                        params![
                            record.url,
                            record.occurrence_count,
                            record.sentences_without_links,
                            record.sentences_with_links,
                            ts
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;

                match id {
                    Some(id) => {
                        report.records_written += 1;
                        if policy == ConflictPolicy::Update && replaced.insert(id) {
                            clear_edges.execute(params![id])?;
                        }
                        written.push((id, record));
                    }
                    None => {
                        report.records_ignored += 1;
                        report.edges_skipped += record.edges.len();
                    }
                }
            }

            for (record_id, record) in written {
                for edge in &record.edges {
                    report.edges_written += insert_edge.execute(params![
                        record_id,
                        edge.anchor_text,
                        edge.destination_url
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    fn get_content_record(&self, url: &str) -> StorageResult<Option<StoredRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, url, occurrence_count, sentences_without_links, sentences_with_links,
                        created_at, updated_at
                 FROM content_records WHERE url = ?1",
                params![url],
                |row| {
                    Ok(StoredRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        occurrence_count: row.get(2)?,
                        sentences_without_links: row.get(3)?,
                        sentences_with_links: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
    }

    fn get_edges(&self, record_id: i64) -> StorageResult<Vec<LinkEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT anchor_text, destination_url FROM link_edges
             WHERE source_record_id = ?1 ORDER BY id",
        )?;
        let edges = stmt
            .query_map(params![record_id], |row| {
                Ok(LinkEdge {
                    anchor_text: row.get(0)?,
                    destination_url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    // ===== Statistics =====

    fn count_content_records(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM content_records")
    }

    fn count_link_edges(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM link_edges")
    }

    fn count_link_opportunities(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM content_records WHERE sentences_without_links > 0")
    }

    fn total_occurrences(&self) -> StorageResult<u64> {
        self.count("SELECT COALESCE(SUM(occurrence_count), 0) FROM content_records")
    }
}
