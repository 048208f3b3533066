use docket_merge::MergeError;
use docket_store::StoreError;
use docket_tree::TreeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangeError {
    /// The file exists and the handle was not opened for update.
    #[error("refusing to overwrite {0}")]
    OverwriteRejected(String),

    /// Every landing attempt failed and the backoff ceiling was reached.
    #[error("failed to finalize commit and could not recover after {attempts} attempts")]
    RecoveryImpossible { attempts: u32 },

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ChangeResult<T> = Result<T, ChangeError>;
