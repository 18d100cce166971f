//! Result store error types.

use std::path::PathBuf;
use std::time::Duration;

/// Result store errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The cross-process lock could not be acquired within the bounded
    /// wait. Surfaced to the caller instead of blocking forever.
    #[error("could not acquire store lock at {path} within {timeout:?}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// An existing column would change type. Growing the column set is a
    /// non-destructive migration; retyping is not.
    #[error("column {column:?} would change type from {existing} to {proposed}")]
    Schema {
        column: String,
        existing: String,
        proposed: String,
    },

    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Temp-file commit failed while writing store data.
    #[error("failed to commit store data: {0}")]
    Persist(#[from] tempfile::PersistError),
}
