//! State module for tracking crawl progress
//!
//! - `FrontierStatus`: lifecycle of a URL in the frontier (pending, in progress, crawled, error)

mod frontier_status;

pub use frontier_status::FrontierStatus;
