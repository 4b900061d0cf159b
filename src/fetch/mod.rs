//! Rate-limited, retrying batch fetches against the marketplace API.
//!
//! Components, leaves first:
//! - [`SlidingWindowLimiter`] caps the process-wide call rate
//! - [`RetryingFetcher`] wraps one [`ItemFetcher`] call with bounded retries
//! - [`BatchOrchestrator`] fans a batch out over a bounded worker pool

use async_trait::async_trait;
use serde::Serialize;

use crate::marketplace::Marketplace;

mod error;
mod limiter;
mod orchestrator;
mod retry;

pub use error::{BatchError, ErrorCode, FetchError};
pub use limiter::SlidingWindowLimiter;
pub use orchestrator::{BatchOptions, BatchOrchestrator};
pub use retry::{RetryPolicy, RetryingFetcher};

/// Single-item remote fetch. Implementations perform one attempt; retries,
/// rate limiting and timeouts are layered on top.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    type Payload: Send + 'static;

    async fn fetch_one(
        &self,
        identifier: &str,
        marketplace: Marketplace,
    ) -> Result<Self::Payload, FetchError>;
}

/// Why an identifier ended up without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    RemoteFailure,
    Timeout,
    MaxRetriesExceeded,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteFailure => "RemoteFailure",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::MaxRetriesExceeded => "MaxRetriesExceeded",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one submitted identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<P> {
    Success {
        identifier: String,
        payload: P,
    },
    Failure {
        identifier: String,
        kind: ErrorKind,
        message: String,
    },
}

impl<P> FetchResult<P> {
    pub fn failure(
        identifier: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        FetchResult::Failure {
            identifier: identifier.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            FetchResult::Success { identifier, .. } | FetchResult::Failure { identifier, .. } => {
                identifier
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Aggregated outcome of one batch, in submission order.
#[derive(Debug, Clone)]
pub struct BatchReport<P> {
    pub results: Vec<FetchResult<P>>,
    pub total_requested: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Percentage, rounded to one decimal place.
    pub success_rate: f64,
}

impl<P> BatchReport<P> {
    pub fn from_results(results: Vec<FetchResult<P>>) -> Self {
        let total_requested = results.len();
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = total_requested - success_count;
        let success_rate = if total_requested == 0 {
            0.0
        } else {
            (success_count as f64 * 1000.0 / total_requested as f64).round() / 10.0
        };

        Self {
            results,
            total_requested,
            success_count,
            failure_count,
            success_rate,
        }
    }

    /// Wire rendering of the success rate, e.g. `60.0%`.
    pub fn success_rate_display(&self) -> String {
        format!("{:.1}%", self.success_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: &str) -> FetchResult<u32> {
        FetchResult::Success {
            identifier: id.to_string(),
            payload: 1,
        }
    }

    #[test]
    fn test_report_counts_and_rate() {
        let report = BatchReport::from_results(vec![
            ok("A"),
            FetchResult::failure("B", ErrorKind::Timeout, "timed out"),
            ok("C"),
        ]);

        assert_eq!(report.total_requested, 3);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.success_rate, 66.7);
        assert_eq!(report.success_rate_display(), "66.7%");
    }

    #[test]
    fn test_report_all_failed() {
        let report: BatchReport<u32> = BatchReport::from_results(vec![FetchResult::failure(
            "A",
            ErrorKind::MaxRetriesExceeded,
            "gave up",
        )]);
        assert_eq!(report.success_rate_display(), "0.0%");
        assert_eq!(report.results[0].error_kind(), Some(ErrorKind::MaxRetriesExceeded));
        assert_eq!(report.results[0].identifier(), "A");
    }
}
