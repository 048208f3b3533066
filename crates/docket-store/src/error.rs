use std::path::PathBuf;

use docket_types::Oid;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object is absent from the object database.
    #[error("object not found: {0}")]
    ObjectNotFound(Oid),

    /// A branch reference does not resolve.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// No valid repository exists at the given path.
    #[error("no repository found at {0}")]
    RepoNotFound(PathBuf),

    /// A repository already exists where a new one was requested.
    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: stored data hashes to {computed}")]
    HashMismatch { id: Oid, computed: Oid },

    /// The object data is malformed or of an unexpected kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: Oid, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A ref or branch name violates naming rules.
    #[error("invalid ref name {name:?}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// A compare-and-swap ref update observed an unexpected current value.
    #[error("ref {name} moved: expected {expected:?}, found {actual:?}")]
    RefConflict {
        name: String,
        expected: Option<Oid>,
        actual: Option<Oid>,
    },

    /// Another writer holds the ref's lock file.
    #[error("ref {0} is locked by another writer")]
    RefLocked(String),

    /// A non-forced update would discard commits on the target.
    #[error("update of {0} is not a fast-forward")]
    NotFastForward(String),

    /// The named remote is not configured.
    #[error("remote not configured: {0}")]
    RemoteNotFound(String),

    /// No transport is available for the remote URL.
    #[error("unsupported remote url: {0}")]
    UnsupportedTransport(String),

    /// A remote operation failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Repository configuration could not be read or written.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
