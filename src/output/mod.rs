//! Output module for crawl reporting
//!
//! This module handles:
//! - Lifecycle hooks for a running crawl
//! - Statistics read back from the store
//! - The end-of-run summary

pub mod stats;
mod traits;

pub use stats::{load_statistics, print_report, print_statistics, CrawlStatistics};
pub use traits::{CrawlObserver, LogObserver};
