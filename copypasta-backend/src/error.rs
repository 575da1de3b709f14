//! Error types for the item store and the service boundary above it.

use copypasta_types::ApiResponse;
use thiserror::Error;

/// Failures inside the item store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Input the store refuses to persist (oversized content, binary edit, ...)
    #[error("{0}")]
    Invalid(String),

    #[error("Content is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Machine-readable error kind carried to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    PartialFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Storage => "storage",
            ErrorKind::PartialFailure => "partial-failure",
        }
    }
}

/// The single tagged error returned by every item service operation
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// Oversized payload; a validation failure reported with HTTP 413
    #[error("{0}")]
    TooLarge(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("{failed} of {attempted} items could not be removed")]
    PartialFailure { attempted: usize, failed: usize },
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) | ServiceError::TooLarge(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Storage(_) => ErrorKind::Storage,
            ServiceError::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }

    /// JSON envelope for this error
    pub fn to_response<T>(&self) -> ApiResponse<T> {
        ApiResponse::err(self.kind().as_str(), self.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::Invalid(msg) => ServiceError::Validation(msg),
            err @ StoreError::TooLarge { .. } => ServiceError::TooLarge(err.to_string()),
            other => {
                log::error!("[STORE] {}", other);
                ServiceError::Storage(other.to_string())
            }
        }
    }
}
