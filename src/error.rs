//! Error types for squidgate
//!
//! Provides a unified error type for store and consumer operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for squidgate operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Shape / Identifier Errors (local validation, never retried)
    // -------------------------------------------------------------------------
    #[error("Invalid record shape for {kind}: {reason}")]
    InvalidRecordShape { kind: &'static str, reason: String },

    #[error("Unable to fetch {kind} without an identifier")]
    MissingIdentifier { kind: &'static str },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // -------------------------------------------------------------------------
    // Field Codec Errors
    // -------------------------------------------------------------------------
    #[error("Failed to encode field {field}: {reason}")]
    Encode { field: String, reason: String },

    #[error("Failed to decode field {field}: {reason}")]
    Decode { field: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] redb::Error),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Consumer Errors
    // -------------------------------------------------------------------------
    #[error("User {user_id} still owns {records} record(s)")]
    OwnershipConflict { user_id: String, records: usize },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential error: {0}")]
    Credentials(String),
}

// redb reports each transaction phase with its own error type; all of them
// mean the engine could not serve the request.
macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(e: $ty) -> Self {
                    StoreError::StorageUnavailable(e.into())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl StoreError {
    /// True for errors raised by the engine rather than by caller input
    pub fn is_storage(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_) | StoreError::Io(_))
    }
}
