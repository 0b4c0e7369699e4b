//! Priority bands for the frontier
//!
//! Lower numbers are claimed first:
//!
//! | Band | URLs |
//! |------|------|
//! | 0 | article pages (path ends with a content suffix such as `.html`) |
//! | 1 | high-value sections (`/live/`, `/quote/`, ...) or URLs with a trending keyword |
//! | 2.. | everything else, one band per path segment, capped at `max-depth-band` |

use crate::config::PriorityConfig;
use url::Url;

/// Band for article pages
pub const CONTENT_PRIORITY: u32 = 0;

/// Band for high-value sections and keyword matches
pub const HIGH_VALUE_PRIORITY: u32 = 1;

/// Computes the frontier priority of a canonical URL
#[derive(Debug, Clone)]
pub struct PriorityPolicy {
    content_suffixes: Vec<String>,
    high_value_paths: Vec<String>,
    keywords: Vec<String>,
    max_depth_band: u32,
}

impl PriorityPolicy {
    pub fn from_config(config: &PriorityConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            content_suffixes: lower(&config.content_suffixes),
            high_value_paths: lower(&config.high_value_paths),
            keywords: lower(&config.keywords),
            max_depth_band: config.max_depth_band.max(HIGH_VALUE_PRIORITY + 1),
        }
    }

    pub fn priority(&self, url: &Url) -> u32 {
        let path = url.path().to_lowercase();

        if self
            .content_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
        {
            return CONTENT_PRIORITY;
        }

        let full = url.as_str().to_lowercase();
        if self
            .high_value_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
            || self
                .keywords
                .iter()
                .any(|keyword| full.contains(keyword.as_str()))
        {
            return HIGH_VALUE_PRIORITY;
        }

        let segments = path.split('/').filter(|s| !s.is_empty()).count() as u32;
        (HIGH_VALUE_PRIORITY + 1)
            .saturating_add(segments)
            .min(self.max_depth_band)
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self::from_config(&PriorityConfig::default())
    }
}
