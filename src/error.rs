//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid match request: {reason}")]
    InvalidMatchRequest { reason: String },

    #[error("Record not found: {kind} {id}")]
    RecordNotFound { kind: String, id: String },

    #[error("Record already exists: {kind} {id}")]
    DuplicateRecord { kind: String, id: String },

    #[error("No default setting has been stored")]
    SettingMissing,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Error for a poisoned lock guarding the named resource
    pub(crate) fn lock_poisoned(resource: &str) -> Self {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", resource),
        }
    }
}
