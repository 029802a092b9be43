//! Error taxonomy for the PR statistics engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T, E = StatsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StatsError {
    /// Missing, unparsable or misordered `since`/`until` bounds.
    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    /// Any other malformed request parameter (repo, bucket).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no GitHub credential available")]
    MissingCredential,

    /// The upstream throttled us. Retrying is the caller's decision.
    #[error("GitHub API rate limited{}", rate_limit_hint(.reset_at, .retry_after_secs))]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
        retry_after_secs: Option<u64>,
        remaining: Option<u64>,
    },

    #[error("GitHub API unavailable{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    SourceUnavailable { status: Option<u16>, message: String },
}

impl StatsError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            status: None,
            message: message.into(),
        }
    }

    /// Seconds the caller should wait before retrying, if the upstream said so.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(*secs),
            Self::RateLimited {
                reset_at: Some(reset_at),
                ..
            } => Some((*reset_at - now).num_seconds().max(0).unsigned_abs()),
            _ => None,
        }
    }
}

fn rate_limit_hint(reset_at: &Option<DateTime<Utc>>, retry_after_secs: &Option<u64>) -> String {
    match (reset_at, retry_after_secs) {
        (Some(reset_at), _) => format!(" (reset at {})", reset_at.to_rfc3339()),
        (None, Some(secs)) => format!(" (retry after {secs}s)"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rate_limited_message_includes_reset() {
        let reset_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let err = StatsError::RateLimited {
            reset_at: Some(reset_at),
            retry_after_secs: None,
            remaining: Some(0),
        };
        assert_eq!(
            err.to_string(),
            "GitHub API rate limited (reset at 2024-01-01T12:00:00+00:00)"
        );

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 11, 59, 0).unwrap();
        assert_eq!(err.retry_after(now), Some(60));
    }

    #[test]
    fn test_retry_after_prefers_explicit_header() {
        let err = StatsError::RateLimited {
            reset_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            retry_after_secs: Some(5),
            remaining: None,
        };
        assert_eq!(err.retry_after(Utc::now()), Some(5));
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = StatsError::SourceUnavailable {
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API unavailable (502): bad gateway");

        let err = StatsError::unavailable("connection reset");
        assert_eq!(err.to_string(), "GitHub API unavailable: connection reset");
    }
}
