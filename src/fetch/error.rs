//! Error types for batch orchestration and single-item fetches.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Batch rejected before any work started
    E001InvalidBatch,
    /// E002: Orchestrator or limiter constructed with an unusable setting
    E002InvalidSetting,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidBatch => "E001",
            Self::E002InvalidSetting => "E002",
        }
    }
}

/// Batch-level failures. Per-item failures never surface here; they are
/// recorded in the item's [`FetchResult`](super::FetchResult).
#[derive(Debug, Error)]
pub enum BatchError {
    /// The submitted identifiers violate a precondition
    #[error("[{code}] {message}")]
    Validation { code: &'static str, message: String },

    /// A limiter or orchestrator setting is out of range
    #[error("[{code}] Invalid setting: {message}")]
    InvalidSetting { code: &'static str, message: String },
}

impl BatchError {
    /// Create a validation error with error code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::E001InvalidBatch.as_str(),
            message: message.into(),
        }
    }

    /// Create an invalid setting error with error code
    pub fn invalid_setting(message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            code: ErrorCode::E002InvalidSetting.as_str(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Failure of one fetch attempt, as reported by an [`ItemFetcher`](super::ItemFetcher).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Remote answered with a status worth retrying (429, 5xx)
    #[error("remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Remote rejected the request outright (4xx other than 429)
    #[error("remote rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Connection, TLS or body decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response payload lacked a field the mapper needs
    #[error("payload missing field {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Permanent errors are not retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = BatchError::validation("no identifiers submitted");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "[E001] no identifiers submitted");

        let err = BatchError::invalid_setting("max_workers must be greater than 0");
        assert!(!err.is_validation());
        assert!(err.to_string().starts_with("[E002] Invalid setting"));
    }

    #[test]
    fn test_only_rejections_are_permanent() {
        assert!(FetchError::Rejected {
            status: 404,
            message: "unknown ASIN".into()
        }
        .is_permanent());
        assert!(!FetchError::Status {
            status: 429,
            message: "throttled".into()
        }
        .is_permanent());
        assert!(!FetchError::Transport("reset".into()).is_permanent());
        assert!(!FetchError::MissingField("Summary.ListPrice.Amount").is_permanent());
    }
}
