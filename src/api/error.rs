//! API Error Types
//!
//! Every failure of a backend call is reported as an [`ApiError`]. Views show
//! [`ApiError::message`] to the user, so variants carry text meant for display.

use std::time::Duration;
use thiserror::Error;

use super::transport::TransportError;
use crate::storage::StorageError;

/// Message used when the backend gives no reason
pub const DEFAULT_FAILURE_MESSAGE: &str = "API request failed";

/// API error types
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Non-2xx response
    #[error("{message}")]
    Status { status: u16, message: String },

    /// 401 that could not be recovered by refreshing the session
    #[error("{0}")]
    SessionExpired(String),

    /// The client-side deadline elapsed
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Network-level failure
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A 2xx body that did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Token persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The backend answered `success: false`
    #[error("{0}")]
    Rejected(String),

    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// Text to show in a toast or inline error
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status, when the backend answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::SessionExpired(_) => Some(401),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_is_backend_text() {
        let err = ApiError::Status {
            status: 400,
            message: "Personnel not found".to_string(),
        };
        assert_eq!(err.message(), "Personnel not found");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_timeout_message() {
        let err = ApiError::Timeout(Duration::from_secs(30));
        assert_eq!(err.message(), "Request timed out after 30s");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_session_expired() {
        let err = ApiError::SessionExpired("Session expired".to_string());
        assert!(err.is_session_expired());
        assert_eq!(err.status(), Some(401));
    }
}
