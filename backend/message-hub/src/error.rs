/// Error types for message-hub
use crate::storage::BlobError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Identity mismatch: {0}")]
    IdentityMismatch(String),

    /// Resource absent, or not owned by the caller. Both read the same.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] BlobError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error classification handed to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidToken,
    IdentityMismatch,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    PermissionDenied,
    Internal,
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::InvalidToken(_) => ErrorCode::InvalidToken,
            ServiceError::IdentityMismatch(_) => ErrorCode::IdentityMismatch,
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            ServiceError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ServiceError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ServiceError::Database(_)
            | ServiceError::Storage(_)
            | ServiceError::Config(_)
            | ServiceError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn message_not_found(id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("message {id} not found"))
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
