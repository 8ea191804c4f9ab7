//! Shared error types for the services crate.

use thiserror::Error;

use microleet_core::model::ImportError;
use storage::repository::StorageError;

/// Errors emitted by the legacy-data migration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MigrationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to serialize progress document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("stored progress document is corrupted: {0}")]
    Corrupted(serde_json::Error),
    #[error("failed to serialize progress document: {0}")]
    Serialize(serde_json::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
}
