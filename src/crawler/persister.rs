//! Batched write-through of content records and link edges
//!
//! Records accumulate in memory and are written in one transaction per
//! batch, when `flush-size` records are buffered and once more at shutdown.
//! A batch that fails to write is rolled back, logged and dropped; the crawl
//! goes on. Only a run of consecutive failures is treated as the store being
//! gone.

use crate::config::{ConflictPolicy, OutputConfig};
use crate::storage::{lock_storage, BatchWrite, ContentRecord, SharedStorage, Storage};
use crate::CrawlError;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Buffer {
    records: Vec<ContentRecord>,
    consecutive_failures: u32,
}

/// What a flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: BatchWrite,
    /// Records lost because their batch failed to write
    pub dropped_records: usize,
}

/// Running totals over the persister's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistTotals {
    pub records_written: usize,
    pub records_ignored: usize,
    pub edges_written: usize,
    pub edges_skipped: usize,
    pub dropped_batches: usize,
    pub dropped_records: usize,
}

impl PersistTotals {
    fn absorb(&mut self, report: &FlushReport) {
        self.records_written += report.written.records_written;
        self.records_ignored += report.written.records_ignored;
        self.edges_written += report.written.edges_written;
        self.edges_skipped += report.written.edges_skipped;
        if report.dropped_records > 0 {
            self.dropped_batches += 1;
            self.dropped_records += report.dropped_records;
        }
    }
}

/// Buffers content records and writes them in batches
pub struct Persister {
    storage: SharedStorage,
    buffer: Mutex<Buffer>,
    totals: Mutex<PersistTotals>,
    flush_size: usize,
    policy: ConflictPolicy,
    max_failures: u32,
}

impl Persister {
    pub fn new(
        storage: SharedStorage,
        flush_size: usize,
        policy: ConflictPolicy,
        max_failures: u32,
    ) -> Self {
        Self {
            storage,
            buffer: Mutex::new(Buffer::default()),
            totals: Mutex::new(PersistTotals::default()),
            flush_size: flush_size.max(1),
            policy,
            max_failures: max_failures.max(1),
        }
    }

    pub fn from_config(storage: SharedStorage, config: &OutputConfig) -> Self {
        Self::new(
            storage,
            config.flush_size as usize,
            config.on_conflict,
            config.max_flush_failures,
        )
    }

    /// Buffers a record, flushing when the buffer reaches the flush size
    ///
    /// Returns the flush report if this call triggered a flush.
    pub fn add_record(&self, record: ContentRecord) -> Result<Option<FlushReport>, CrawlError> {
        let full = {
            let mut buffer = self.lock_buffer()?;
            buffer.records.push(record);
            buffer.records.len() >= self.flush_size
        };

        if full {
            self.flush().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Number of records waiting to be written
    pub fn buffered(&self) -> Result<usize, CrawlError> {
        Ok(self.lock_buffer()?.records.len())
    }

    /// Writes everything buffered so far
    ///
    /// A failed write is rolled back and the batch dropped; this returns `Ok`
    /// with `dropped_records` set. After `max-flush-failures` consecutive
    /// failed writes it returns [`CrawlError::StoreUnavailable`].
    pub fn flush(&self) -> Result<FlushReport, CrawlError> {
        let records = std::mem::take(&mut self.lock_buffer()?.records);

        if records.is_empty() {
            return Ok(FlushReport::default());
        }

        let result = lock_storage(&self.storage)
            .and_then(|mut storage| storage.write_batch(&records, self.policy));

        let report = match result {
            Ok(written) => {
                self.lock_buffer()?.consecutive_failures = 0;
                tracing::debug!(
                    "Flushed {} records ({} ignored), {} edges",
                    written.records_written,
                    written.records_ignored,
                    written.edges_written
                );
                if written.edges_skipped > 0 {
                    tracing::debug!(
                        "Kept stored edges for {} already-stored records ({} new edges skipped)",
                        written.records_ignored,
                        written.edges_skipped
                    );
                }
                FlushReport {
                    written,
                    dropped_records: 0,
                }
            }
            Err(e) => {
                let failures = {
                    let mut buffer = self.lock_buffer()?;
                    buffer.consecutive_failures += 1;
                    buffer.consecutive_failures
                };
                tracing::error!(
                    "Dropped batch of {} records after failed write ({}/{}): {}",
                    records.len(),
                    failures,
                    self.max_failures,
                    e
                );

                let report = FlushReport {
                    written: BatchWrite::default(),
                    dropped_records: records.len(),
                };
                self.record(&report)?;

                if failures >= self.max_failures {
                    return Err(CrawlError::StoreUnavailable {
                        failures,
                        last_error: e.to_string(),
                    });
                }
                return Ok(report);
            }
        };

        self.record(&report)?;
        Ok(report)
    }

    pub fn totals(&self) -> Result<PersistTotals, CrawlError> {
        Ok(*self
            .totals
            .lock()
            .map_err(|_| CrawlError::Task("persister totals lock poisoned".to_string()))?)
    }

    fn record(&self, report: &FlushReport) -> Result<(), CrawlError> {
        self.totals
            .lock()
            .map_err(|_| CrawlError::Task("persister totals lock poisoned".to_string()))?
            .absorb(report);
        Ok(())
    }

    fn lock_buffer(&self) -> Result<std::sync::MutexGuard<'_, Buffer>, CrawlError> {
        self.buffer
            .lock()
            .map_err(|_| CrawlError::Task("persister buffer lock poisoned".to_string()))
    }
}
