use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid data source config: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] docket_store::StoreError),

    #[error("change error: {0}")]
    Change(#[from] docket_change::ChangeError),

    #[error("diff error: {0}")]
    Diff(#[from] docket_diff::DiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
