//! Closed outcome taxonomy for a single check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of one `(target, handle)` check.
///
/// `Found` and `NotFound` are definitive. The other four are inconclusive: the
/// true membership state is unknown and must never be reported as "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Found,
    NotFound,
    RateLimited,
    Timeout,
    NetworkError,
    UnknownError,
}

impl CheckOutcome {
    pub const ALL: [CheckOutcome; 6] = [
        CheckOutcome::Found,
        CheckOutcome::NotFound,
        CheckOutcome::RateLimited,
        CheckOutcome::Timeout,
        CheckOutcome::NetworkError,
        CheckOutcome::UnknownError,
    ];

    pub fn is_definitive(self) -> bool {
        matches!(self, CheckOutcome::Found | CheckOutcome::NotFound)
    }

    pub fn is_error(self) -> bool {
        !self.is_definitive()
    }

    /// Stable machine-readable label, used in exports.
    pub fn as_str(self) -> &'static str {
        match self {
            CheckOutcome::Found => "found",
            CheckOutcome::NotFound => "not_found",
            CheckOutcome::RateLimited => "rate_limited",
            CheckOutcome::Timeout => "timeout",
            CheckOutcome::NetworkError => "network_error",
            CheckOutcome::UnknownError => "unknown_error",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            CheckOutcome::Found => "FOUND",
            CheckOutcome::NotFound => "Not Found",
            CheckOutcome::RateLimited => "Rate Limited",
            CheckOutcome::Timeout => "Timeout",
            CheckOutcome::NetworkError => "Network Error",
            CheckOutcome::UnknownError => "Unknown",
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one target check together with display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Registry key, e.g. `github`.
    pub target: String,
    /// Display name, e.g. `GitHub`.
    pub name: String,
    pub outcome: CheckOutcome,
    /// Canonical profile URL, only populated for [`CheckOutcome::Found`].
    pub profile_url: Option<String>,
}

impl CheckReport {
    pub fn new(
        target: impl Into<String>,
        name: impl Into<String>,
        outcome: CheckOutcome,
        profile_url: Option<String>,
    ) -> Self {
        let profile_url = if outcome == CheckOutcome::Found {
            profile_url
        } else {
            None
        };
        Self {
            target: target.into(),
            name: name.into(),
            outcome,
            profile_url,
        }
    }
}
