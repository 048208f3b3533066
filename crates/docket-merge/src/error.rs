//! Error types for the merge crate.

use docket_store::StoreError;

/// Errors that can occur while merging.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Both sides changed the same path in different ways.
    #[error("merge conflict at {path}")]
    Conflict { path: String },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
