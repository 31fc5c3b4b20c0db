//! Error types for store operations

use std::fmt;

/// Result type alias for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations
#[derive(Debug)]
pub enum StorageError {
    /// A referenced record does not exist
    NotFound(String),

    /// A query against the backing store failed
    QueryFailed(String),

    /// Record serialization/deserialization error
    SerializationError(String),

    /// Backend-specific error
    BackendError(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "record not found: {}", msg),
            StorageError::QueryFailed(msg) => write!(f, "store query failed: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "record serialization error: {}", msg)
            }
            StorageError::BackendError(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}
