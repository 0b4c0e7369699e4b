/// Lifecycle states of a frontier entry
///
/// Entries only ever move forward: `Pending -> InProgress -> {Crawled, Error}`.
/// Resetting an entry back to `Pending` is an explicit operator action
/// (see [`FrontierStatus::can_requeue`]).
use std::fmt;

/// Represents the crawl status of a URL in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierStatus {
    /// Discovered and waiting to be claimed
    Pending,

    /// Claimed by a worker, fetch in progress
    InProgress,

    /// Fetched and processed (including terminal skips such as 404)
    Crawled,

    /// Fetch failed after all retries
    Error,
}

impl FrontierStatus {
    /// Returns true if moving from `self` to `next` is a legal crawl transition
    pub fn can_transition_to(&self, next: FrontierStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Crawled)
                | (Self::InProgress, Self::Error)
        )
    }

    /// Returns true if an operator may reset this status back to `Pending`
    ///
    /// `InProgress` entries are only stale after a crash; callers are
    /// expected to make sure no crawl is running before requeueing them.
    pub fn can_requeue(&self) -> bool {
        matches!(self, Self::Error | Self::InProgress)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Crawled => "crawled",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "crawled" => Some(Self::Crawled),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for FrontierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
