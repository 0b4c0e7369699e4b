//! Integration tests
//!
//! These tests drive the crawler against wiremock servers and SQLite
//! databases in temporary directories.

mod crawl_tests;
mod fetch_tests;
mod frontier_tests;
mod support;
