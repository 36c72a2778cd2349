//! Error types for the checkpoint subsystem

use thiserror::Error;

/// Result type alias for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Error type for checkpoint operations
///
/// Absent keys are not errors: point lookups return `Ok(None)`. `NotFound`
/// is reserved for the cases where the caller asked for a record that must
/// exist, such as opening an index checkpoint without requesting creation.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to open checkpoint store: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Checkpoint store transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Checkpoint store table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Checkpoint store access failed: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Checkpoint store commit failed: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Checkpoint store compaction failed: {0}")]
    Compaction(#[from] redb::CompactionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint record not found: {0}")]
    NotFound(String),

    #[error("Checkpoint store is closed: {0}")]
    StoreClosed(String),

    #[error("Checkpoint store lock poisoned")]
    LockPoisoned,

    #[error("{0} failed after retries with no error captured")]
    RetriesExhausted(String),
}

impl CheckpointError {
    /// Create a not-found error for the given record key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }
}
