//! Wire types returned by GitHub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository metadata, as much of it as the chart needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub stargazers_count: u64,
    pub created_at: DateTime<Utc>,
}

/// A star at a point in time.
///
/// `ordinal` is only set in sampling mode, where it records the star's rank
/// among all stars of the repository rather than its position in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarEvent {
    pub starred_at: DateTime<Utc>,
    #[serde(skip)]
    pub ordinal: Option<u64>,
}
