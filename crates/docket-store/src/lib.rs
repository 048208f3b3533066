//! # docket-store
//!
//! Content store for Docket: a git-style object database of blobs, trees and
//! commits addressed by BLAKE3 hash, named branch references, commit-graph
//! queries and remote synchronisation.
//!
//! [`Repository`] is the entry point. All of its operations are serialised
//! through one gate per repository; higher layers build trees and commits in
//! memory and only touch the store to read, write and land.

pub mod config;
pub mod error;
pub mod hasher;
pub mod history;
pub mod loose;
pub mod names;
pub mod object;
pub mod refs;
pub mod remote;
pub mod repository;
pub mod traits;

pub use config::{RemoteConfig, RepoConfig};
pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use loose::LooseObjectStore;
pub use object::{Blob, Commit, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use refs::FsRefStore;
pub use remote::{open_transport, LocalTransport, RemoteTransport};
pub use repository::Repository;
pub use traits::{ObjectStore, RefStore};
