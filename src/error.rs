//! Error types for storage and synchronization.

use crate::types::ObjectId;
use thiserror::Error;

/// Storage collaborator errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Object encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Object {id} is not a {expected}")]
    UnexpectedObject { id: ObjectId, expected: &'static str },

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("Branch {branch} moved: expected tip {expected:?}, found {actual:?}")]
    TipMismatch {
        branch: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

/// Errors surfaced by histories, diffs and the synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("Invalid state transition for action {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("{operation} gave up after {attempts} attempts: branch kept moving")]
    ConcurrentModification {
        operation: &'static str,
        attempts: usize,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        SyncError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: &'static str, id: impl ToString) -> Self {
        SyncError::Duplicate {
            kind,
            id: id.to_string(),
        }
    }

    /// True when a push lost a compare-and-swap race on a branch tip.
    pub fn is_tip_mismatch(&self) -> bool {
        matches!(self, SyncError::Storage(StorageError::TipMismatch { .. }))
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}
