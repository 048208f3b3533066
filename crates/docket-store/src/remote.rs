//! Remote repositories: the transport seam plus object transfer.
//!
//! A [`RemoteTransport`] exposes the handful of primitives fetch and push
//! need. [`LocalTransport`] serves repositories reachable through the
//! filesystem (`file://` URLs or plain paths). Network backends plug in
//! through the same trait.

use std::path::{Path, PathBuf};

use docket_types::Oid;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::history;
use crate::loose::LooseObjectStore;
use crate::names::{branch_ref, validate_branch_name, HEADS_PREFIX};
use crate::object::{Commit, EntryMode, ObjectKind, StoredObject, Tree};
use crate::refs::FsRefStore;
use crate::traits::{ObjectStore, RefStore};

/// Primitive operations against a remote repository.
pub trait RemoteTransport: Send + Sync {
    /// Branch heads as `(branch name, target)` pairs.
    fn list_heads(&self) -> StoreResult<Vec<(String, Oid)>>;

    fn read_object(&self, id: &Oid) -> StoreResult<Option<StoredObject>>;

    fn has_object(&self, id: &Oid) -> StoreResult<bool>;

    fn write_object(&self, object: &StoredObject) -> StoreResult<Oid>;

    /// Point remote `branch` at `target`.
    ///
    /// When `expected` is set the branch must currently point there. Without
    /// `force` the update must be a fast-forward.
    fn update_head(&self, branch: &str, target: &Oid, expected: Option<Oid>, force: bool) -> StoreResult<()>;
}

/// Transport for a repository on the local filesystem.
#[derive(Debug)]
pub struct LocalTransport {
    objects: LooseObjectStore,
    refs: FsRefStore,
}

impl LocalTransport {
    /// Open the repository at `path` (bare, or with a `.git` directory).
    pub fn open(path: &Path) -> StoreResult<Self> {
        let gitdir = locate_gitdir(path).ok_or_else(|| StoreError::RepoNotFound(path.to_path_buf()))?;
        Ok(Self {
            objects: LooseObjectStore::new(gitdir.join("objects")),
            refs: FsRefStore::new(gitdir),
        })
    }
}

/// The git directory for a repository rooted at `path`, if one exists.
pub(crate) fn locate_gitdir(path: &Path) -> Option<PathBuf> {
    let is_gitdir = |dir: &Path| dir.join("objects").is_dir() && dir.join("refs").is_dir();
    if is_gitdir(path) {
        return Some(path.to_path_buf());
    }
    let nested = path.join(".git");
    is_gitdir(&nested).then_some(nested)
}

impl RemoteTransport for LocalTransport {
    fn list_heads(&self) -> StoreResult<Vec<(String, Oid)>> {
        Ok(self
            .refs
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .filter_map(|(name, oid)| name.strip_prefix(HEADS_PREFIX).map(|b| (b.to_string(), oid)))
            .collect())
    }

    fn read_object(&self, id: &Oid) -> StoreResult<Option<StoredObject>> {
        self.objects.read(id)
    }

    fn has_object(&self, id: &Oid) -> StoreResult<bool> {
        self.objects.exists(id)
    }

    fn write_object(&self, object: &StoredObject) -> StoreResult<Oid> {
        self.objects.write(object)
    }

    fn update_head(&self, branch: &str, target: &Oid, expected: Option<Oid>, force: bool) -> StoreResult<()> {
        validate_branch_name(branch)?;
        if !self.objects.exists(target)? {
            return Err(StoreError::Transport(format!(
                "remote is missing {target} for branch {branch}"
            )));
        }
        let name = branch_ref(branch);
        self.refs.update_locked(&name, target, |current| {
            if let Some(expected) = expected {
                if current != Some(expected) {
                    return Err(StoreError::RefConflict {
                        name: name.clone(),
                        expected: Some(expected),
                        actual: current,
                    });
                }
            }
            match current {
                Some(current) if !force && !history::is_ancestor(&self.objects, &current, target)? => {
                    Err(StoreError::NotFastForward(name.clone()))
                }
                _ => Ok(()),
            }
        })
    }
}

/// Build a transport for `url`: `file://` URLs and plain paths are local.
pub fn open_transport(url: &str) -> StoreResult<LocalTransport> {
    let path = match url.split_once("://") {
        Some(("file", rest)) => rest,
        Some(_) => return Err(StoreError::UnsupportedTransport(url.to_string())),
        None => url,
    };
    LocalTransport::open(Path::new(path))
}

/// Object ids directly referenced by `object`.
fn references(id: &Oid, object: &StoredObject) -> StoreResult<Vec<Oid>> {
    match object.kind {
        ObjectKind::Blob => Ok(Vec::new()),
        ObjectKind::Tree => {
            let tree = Tree::from_stored_object(object.clone())?;
            Ok(tree
                .entries
                .into_iter()
                .filter(|e| e.mode != EntryMode::Submodule)
                .map(|e| e.oid)
                .collect())
        }
        ObjectKind::Commit => {
            let commit = Commit::from_stored_object(object.clone()).map_err(|e| StoreError::CorruptObject {
                id: *id,
                reason: e.to_string(),
            })?;
            let mut refs = vec![commit.tree];
            refs.extend(commit.parents);
            Ok(refs)
        }
    }
}

/// Copy every object reachable from `root` that `has` reports missing.
///
/// Traversal stops at objects the destination already holds. Objects are
/// written dependencies first, so an interrupted copy never leaves an object
/// whose references are absent. Returns the number of objects written.
pub(crate) fn copy_reachable<R, H, W>(root: &Oid, read: R, has: H, write: W) -> StoreResult<usize>
where
    R: Fn(&Oid) -> StoreResult<Option<StoredObject>>,
    H: Fn(&Oid) -> StoreResult<bool>,
    W: Fn(&StoredObject) -> StoreResult<Oid>,
{
    let mut pending = vec![*root];
    let mut seen = std::collections::HashSet::new();
    let mut missing = Vec::new();
    while let Some(id) = pending.pop() {
        if !seen.insert(id) || has(&id)? {
            continue;
        }
        let object = read(&id)?.ok_or(StoreError::ObjectNotFound(id))?;
        pending.extend(references(&id, &object)?);
        missing.push(object);
    }
    for object in missing.iter().rev() {
        write(object)?;
    }
    debug!(root = %root.short_hex(), copied = missing.len(), "objects transferred");
    Ok(missing.len())
}
