//! Quota probe classification for GitHub `/rate_limit` answers
//!
//! Before a token is used it is probed against the rate-limit endpoint. A 401
//! means the token is dead and must be invalidated. Any other non-2xx answer
//! rejects the token for this attempt only. A 2xx answer carries the core
//! quota, which is then compared against the configured floor.

use serde::Deserialize;

/// Core quota figures as reported by the rate-limit endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateStatus {
    pub remaining: u64,
    pub limit: u64,
}

impl RateStatus {
    /// Remaining quota as an integer percentage of the limit.
    ///
    /// `None` when the limit is zero.
    pub fn remaining_pct(&self) -> Option<u64> {
        if self.limit == 0 {
            return None;
        }
        Some(self.remaining.saturating_mul(100) / self.limit)
    }

    /// Whether the remaining quota sits below `floor_pct` percent.
    ///
    /// A zero limit counts as below any floor.
    pub fn is_below_floor(&self, floor_pct: u8) -> bool {
        match self.remaining_pct() {
            Some(pct) => pct < u64::from(floor_pct),
            None => true,
        }
    }
}

/// Body of a successful `/rate_limit` answer. Only the `rate` section is read.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    pub rate: RateStatus,
}

/// What a quota probe's HTTP status says about the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx: read the body and check the floor.
    Accepted,
    /// 401: the token is no longer valid.
    InvalidCredential,
    /// Anything else: skip the token for this attempt.
    Rejected,
}

/// Classify a quota probe by HTTP status.
pub fn classify_probe(status: u16) -> ProbeOutcome {
    match status {
        401 => ProbeOutcome::InvalidCredential,
        200..=299 => ProbeOutcome::Accepted,
        _ => ProbeOutcome::Rejected,
    }
}
