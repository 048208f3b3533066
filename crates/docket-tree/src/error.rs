use docket_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// An intermediate directory of the path does not exist.
    #[error("{0} does not exist")]
    PathNotFound(String),

    /// The final path segment does not name a file.
    #[error("no such file {0}")]
    LeafNotFound(String),

    /// The path is empty or has an empty segment.
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type TreeResult<T> = Result<T, TreeError>;
