//! Crawl lifecycle hooks
//!
//! The coordinator reports to a [`CrawlObserver`] when a run starts, for every
//! content record it produces, and when the run ends. Observers are called
//! from crawl tasks and must not block.

use crate::crawler::CrawlReport;
use crate::storage::ContentRecord;

/// Receives lifecycle events from a running crawl
pub trait CrawlObserver: Send + Sync {
    /// Called once, after the frontier has been seeded
    fn on_start(&self, run_id: i64, seeds: &[String]) {
        let _ = (run_id, seeds);
    }

    /// Called for every record handed to the persister
    fn on_item(&self, record: &ContentRecord) {
        let _ = record;
    }

    /// Called once with the final report, after the last flush
    fn on_finish(&self, report: &CrawlReport) {
        let _ = report;
    }
}

/// Default observer: writes lifecycle events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl CrawlObserver for LogObserver {
    fn on_start(&self, run_id: i64, seeds: &[String]) {
        tracing::info!("Run {} started with {} seed URLs", run_id, seeds.len());
    }

    fn on_item(&self, record: &ContentRecord) {
        tracing::debug!(
            url = %record.url,
            occurrences = record.occurrence_count,
            without_links = record.sentences_without_links,
            with_links = record.sentences_with_links,
            "Extracted record"
        );
    }

    fn on_finish(&self, report: &CrawlReport) {
        tracing::info!(
            "Run {} {}: {} crawled, {} queued, {} warnings, {} errors in {:.1?}",
            report.run_id,
            report.status.to_db_string(),
            report.counters.crawled,
            report.counters.queued,
            report.counters.warnings,
            report.counters.errors,
            report.elapsed
        );
    }
}
