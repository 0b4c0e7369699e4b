//! Configuration module
//!
//! Loads a TOML file, validates it once at startup, and hands out an
//! immutable [`Config`] that the rest of the crawler borrows.
//!
//! # Example
//!
//! ```no_run
//! use linkscout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkscout.toml")).unwrap();
//! println!("Claiming {} URLs per batch", config.crawler.batch_size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, ConflictPolicy, CrawlerConfig, ExtractConfig, OutputConfig, PriorityConfig,
    ScopeConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
