//! # AppError
//!
//! Centralized error handling for the Rusty-Board data layer.
//! Maps backend and policy failures to the error kinds the UI reacts to.

use thiserror::Error;

/// The primary error type for every operation crossing the service boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., user profile, post)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty or unknown board id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Rejected by the role policy before any store was touched
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The remote store is not reachable in the current backend mode
    #[error("backend unavailable for {operation}")]
    BackendUnavailable { operation: String },

    /// Transient remote failures outlasted the retry budget
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    /// Neither the remote store nor the local cache accepted a write
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A delete could not be applied to the underlying store
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// External readiness was not observed within the wait budget
    #[error("external readiness not observed within {waited_ms}ms")]
    InitTimeout { waited_ms: u64 },

    /// Local persistence failure (e.g., quota exceeded, unreadable snapshot)
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else coming out of an adapter
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures that mean "the remote side could not be used", as opposed to
    /// a caller mistake. The board manager falls back to the local cache on these.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            AppError::BackendUnavailable { .. } | AppError::RetriesExhausted { .. }
        )
    }
}

/// A specialized Result type for Rusty-Board logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_exhausted_names_operation_and_attempts() {
        let err = AppError::RetriesExhausted {
            operation: "posts.add".into(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "posts.add failed after 3 attempts");
        assert!(err.is_backend_failure());
    }

    #[test]
    fn permission_denied_is_not_a_backend_failure() {
        assert!(!AppError::PermissionDenied("delete".into()).is_backend_failure());
    }
}
