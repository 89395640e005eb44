//! Error types for the recovery engine.
//!
//! Every failure is surfaced synchronously to the caller. Each variant carries
//! a stable machine-readable code so hosts can map errors onto their own
//! transport (HTTP status, CLI exit code, UI message).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Recovery engine error type.
#[derive(Error, Debug)]
pub enum RecoveryError {
    // Setup errors
    #[error("Invalid recovery configuration: {0}")]
    Config(String),

    #[error("Invalid threshold: t={threshold} must satisfy 2 <= t <= n={total}")]
    InvalidThreshold { threshold: usize, total: usize },

    #[error("Recovery is not configured")]
    NotConfigured,

    #[error("Guardian not found: {0}")]
    GuardianNotFound(String),

    // Request lifecycle errors
    #[error("Recovery already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("No pending recovery request")]
    NoPendingRequest,

    #[error("Time lock active until {ends_at}")]
    TimeLockActive { ends_at: DateTime<Utc> },

    #[error("Recovery not ready: collected {collected} of {required} shares")]
    NotReady { collected: usize, required: usize },

    #[error("Guardian already submitted a share: {0}")]
    DuplicateSubmission(String),

    // Share errors
    #[error("Invalid shares: {0}")]
    Validation(String),

    #[error("Malformed share: {0}")]
    Format(String),

    #[error("Unsupported share version: expected {expected}, got {found}")]
    Version { found: u8, expected: u8 },

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Field arithmetic error: {0}")]
    Arithmetic(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecoveryError {
    /// Get the error code for structured error reporting.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("CONFIG_ERROR"),
            Self::InvalidThreshold { .. } => Some("INVALID_THRESHOLD"),
            Self::NotConfigured => Some("NOT_CONFIGURED"),
            Self::GuardianNotFound(_) => Some("GUARDIAN_NOT_FOUND"),
            Self::AlreadyInProgress(_) => Some("ALREADY_IN_PROGRESS"),
            Self::NoPendingRequest => Some("NO_PENDING_REQUEST"),
            Self::TimeLockActive { .. } => Some("TIME_LOCK_ACTIVE"),
            Self::NotReady { .. } => Some("NOT_READY"),
            Self::DuplicateSubmission(_) => Some("DUPLICATE_SUBMISSION"),
            Self::Validation(_) => Some("VALIDATION_ERROR"),
            Self::Format(_) => Some("FORMAT_ERROR"),
            Self::Version { .. } => Some("VERSION_ERROR"),
            Self::Verification(_) => Some("VERIFICATION_ERROR"),
            Self::Arithmetic(_) => Some("ARITHMETIC_ERROR"),
            Self::Storage(_) => Some("STORAGE_ERROR"),
            Self::Serialization(_) => Some("SERIALIZATION_ERROR"),
            Self::Deserialization(_) => Some("DESERIALIZATION_ERROR"),
            Self::Internal(_) => None, // Don't expose internal error codes
        }
    }

    /// Whether the caller supplied a bad setup and must fix it before retrying.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidThreshold { .. })
    }
}

// Conversion from common error types

impl From<std::io::Error> for RecoveryError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RecoveryError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

impl From<redb::Error> for RecoveryError {
    fn from(err: redb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::DatabaseError> for RecoveryError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TableError> for RecoveryError {
    fn from(err: redb::TableError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TransactionError> for RecoveryError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::CommitError> for RecoveryError {
    fn from(err: redb::CommitError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::StorageError> for RecoveryError {
    fn from(err: redb::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RecoveryError::TimeLockActive {
                ends_at: Utc::now()
            }
            .error_code(),
            Some("TIME_LOCK_ACTIVE")
        );
        assert_eq!(
            RecoveryError::Version {
                found: 2,
                expected: 1
            }
            .error_code(),
            Some("VERSION_ERROR")
        );
        assert_eq!(RecoveryError::Internal("test".to_string()).error_code(), None);
    }

    #[test]
    fn test_config_error_classification() {
        assert!(RecoveryError::Config("bad".to_string()).is_config_error());
        assert!(
            RecoveryError::InvalidThreshold {
                threshold: 1,
                total: 3
            }
            .is_config_error()
        );
        assert!(!RecoveryError::NotConfigured.is_config_error());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            RecoveryError::from(err),
            RecoveryError::Deserialization(_)
        ));
    }
}
