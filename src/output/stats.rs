//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::crawler::{CrawlReport, FrontierCounts};
use crate::state::FrontierStatus;
use crate::storage::{RunRecord, Storage};
use crate::CrawlError;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub frontier: FrontierCounts,

    /// Articles with a stored content record
    pub content_records: u64,

    pub link_edges: u64,

    /// Records with at least one term sentence lacking a link
    pub link_opportunities: u64,

    /// Canonical URLs that had a query string stripped
    pub parameterized_urls: u64,

    /// Search-term occurrences summed over all records
    pub total_occurrences: u64,

    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, CrawlError> {
    let frontier = FrontierCounts {
        pending: storage.count_by_status(FrontierStatus::Pending)?,
        in_progress: storage.count_by_status(FrontierStatus::InProgress)?,
        crawled: storage.count_by_status(FrontierStatus::Crawled)?,
        error: storage.count_by_status(FrontierStatus::Error)?,
    };

    Ok(CrawlStatistics {
        frontier,
        content_records: storage.count_content_records()?,
        link_edges: storage.count_link_edges()?,
        link_opportunities: storage.count_link_opportunities()?,
        parameterized_urls: storage.count_parameterized_urls()?,
        total_occurrences: storage.total_occurrences()?,
        latest_run: storage.get_latest_run()?,
    })
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    let total = stats.frontier.total();
    println!("Frontier ({} URLs):", total);
    for (status, count) in [
        (FrontierStatus::Pending, stats.frontier.pending),
        (FrontierStatus::InProgress, stats.frontier.in_progress),
        (FrontierStatus::Crawled, stats.frontier.crawled),
        (FrontierStatus::Error, stats.frontier.error),
    ] {
        println!(
            "  {}: {} ({:.1}%)",
            status,
            count,
            percentage(count, total)
        );
    }
    println!();

    println!("Content:");
    println!("  Records: {}", stats.content_records);
    println!("  Term occurrences: {}", stats.total_occurrences);
    println!("  Link edges: {}", stats.link_edges);
    println!(
        "  Link opportunities: {} ({:.1}% of records)",
        stats.link_opportunities,
        percentage(stats.link_opportunities, stats.content_records)
    );
    println!("  URLs with stripped parameters: {}", stats.parameterized_urls);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Crawled: {}, queued: {}, warnings: {}, errors: {}",
                run.totals.crawled, run.totals.queued, run.totals.warnings, run.totals.errors
            );
        }
        None => println!("No crawl runs recorded"),
    }
}

/// Prints the end-of-run summary
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Run #{} ({}) ===\n", report.run_id, report.status.to_db_string());

    println!("  Crawled:  {}", report.counters.crawled);
    println!("  Queued:   {}", report.counters.queued);
    println!("  Warnings: {}", report.counters.warnings);
    println!("  Errors:   {}", report.counters.errors);
    println!();

    println!(
        "  Records written: {} ({} already stored)",
        report.persisted.records_written, report.persisted.records_ignored
    );
    println!("  Link edges written: {}", report.persisted.edges_written);
    if report.persisted.dropped_batches > 0 {
        println!(
            "  Dropped batches: {} ({} records)",
            report.persisted.dropped_batches, report.persisted.dropped_records
        );
    }
    println!("  Link opportunities: {}", report.link_opportunities);
    println!();

    println!(
        "  Frontier: {} pending, {} crawled, {} error",
        report.frontier.pending, report.frontier.crawled, report.frontier.error
    );
    println!("  Elapsed: {:.1?}", report.elapsed);
}
