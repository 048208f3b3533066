//! Error types for the diff crate.

/// Errors that can occur while diffing trees into index operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] docket_store::StoreError),

    /// The index sink rejected an operation.
    #[error("index operation failed: {0}")]
    Sink(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
