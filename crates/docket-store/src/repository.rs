//! The [`Repository`]: one on-disk object database plus its refs, config and
//! remotes, behind a single exclusive-access gate.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};

use docket_types::Oid;
use tracing::{debug, info};

use crate::config::{RemoteConfig, RepoConfig};
use crate::error::{StoreError, StoreResult};
use crate::history;
use crate::loose::LooseObjectStore;
use crate::names::{branch_ref, remote_ref, validate_branch_name, validate_remote_name, HEADS_PREFIX, REMOTES_PREFIX};
use crate::object::{Blob, Commit, Tree};
use crate::refs::FsRefStore;
use crate::remote::{copy_reachable, locate_gitdir, open_transport, RemoteTransport};
use crate::traits::{ObjectStore, RefStore};

/// A content-addressed repository on the local filesystem.
///
/// Every public operation acquires the repository's gate for its whole
/// duration, so at most one storage or network call runs at a time. The gate
/// is shared by every `Repository` in the process opened on the same git
/// directory. Callers share a repository through `Arc<Repository>`.
///
/// A [`LocalTransport`](crate::LocalTransport) reading or writing another
/// repository's directory runs under the gate of the repository that calls
/// it, not the target's; object files and refs are only ever replaced by
/// atomic renames, so readers on the other side see old or new state.
pub struct Repository {
    path: PathBuf,
    gitdir: PathBuf,
    objects: LooseObjectStore,
    refs: FsRefStore,
    config: RwLock<RepoConfig>,
    transports: RwLock<HashMap<String, Arc<dyn RemoteTransport>>>,
    gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("gitdir", &self.gitdir)
            .finish_non_exhaustive()
    }
}

/// Accept either a canonical ref (`refs/...`) or a bare branch name.
fn canonical(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        branch_ref(name)
    }
}

/// The gate for `gitdir`, shared by every repository open on it.
fn shared_gate(gitdir: &Path) -> Arc<Mutex<()>> {
    static GATES: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> = OnceLock::new();
    let key = fs::canonicalize(gitdir).unwrap_or_else(|_| gitdir.to_path_buf());
    let mut gates = GATES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    gates.retain(|_, gate| gate.strong_count() > 0);
    if let Some(gate) = gates.get(&key).and_then(Weak::upgrade) {
        return gate;
    }
    let gate = Arc::new(Mutex::new(()));
    gates.insert(key, Arc::downgrade(&gate));
    gate
}

impl Repository {
    fn from_parts(path: PathBuf, gitdir: PathBuf, config: RepoConfig) -> Self {
        let gate = shared_gate(&gitdir);
        Self {
            objects: LooseObjectStore::new(gitdir.join("objects")),
            refs: FsRefStore::new(gitdir.clone()),
            path,
            gitdir,
            config: RwLock::new(config),
            transports: RwLock::new(HashMap::new()),
            gate,
        }
    }

    fn create(path: &Path, bare: bool) -> StoreResult<Self> {
        if locate_gitdir(path).is_some() {
            return Err(StoreError::RepoExists(path.to_path_buf()));
        }
        let gitdir = if bare { path.to_path_buf() } else { path.join(".git") };
        fs::create_dir_all(gitdir.join("objects"))?;
        fs::create_dir_all(gitdir.join(HEADS_PREFIX))?;
        fs::create_dir_all(gitdir.join(REMOTES_PREFIX))?;
        let config = RepoConfig {
            bare,
            ..RepoConfig::default()
        };
        config.save(&gitdir)?;
        info!(path = %path.display(), bare, "repository initialised");
        Ok(Self::from_parts(path.to_path_buf(), gitdir, config))
    }

    /// Create an empty bare repository at `path`.
    pub fn init_bare(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::create(path.as_ref(), true)
    }

    /// Open an existing repository (bare, or with a `.git` directory).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let gitdir = locate_gitdir(path).ok_or_else(|| StoreError::RepoNotFound(path.to_path_buf()))?;
        let config = RepoConfig::load(&gitdir)?;
        debug!(path = %path.display(), "repository opened");
        Ok(Self::from_parts(path.to_path_buf(), gitdir, config))
    }

    /// Clone `url` into a new non-bare repository at `path`.
    ///
    /// The source is recorded as remote `origin`, all of its objects are
    /// fetched and every remote branch gets a local branch of the same name.
    pub fn clone(url: &str, path: impl AsRef<Path>) -> StoreResult<Self> {
        let repo = Self::create(path.as_ref(), false)?;
        repo.add_remote("origin", url)?;
        repo.fetch_all()?;
        let gate = repo.lock();
        let prefix = remote_ref("origin", "");
        for (name, oid) in repo.refs.list_refs(&prefix)? {
            if let Some(branch) = name.strip_prefix(&prefix) {
                repo.refs.write_ref(&branch_ref(branch), &oid)?;
            }
        }
        drop(gate);
        info!(url, path = %path.as_ref().display(), "repository cloned");
        Ok(repo)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    pub fn is_bare(&self) -> bool {
        self.config.read().unwrap_or_else(|e| e.into_inner()).bare
    }

    // -- objects ------------------------------------------------------------

    pub fn write_blob(&self, data: &[u8]) -> StoreResult<Oid> {
        let _gate = self.lock();
        self.objects.write(&Blob::new(data.to_vec()).to_stored_object())
    }

    pub fn read_blob(&self, id: &Oid) -> StoreResult<Vec<u8>> {
        let _gate = self.lock();
        let obj = self.objects.read(id)?.ok_or(StoreError::ObjectNotFound(*id))?;
        Ok(Blob::from_stored_object(obj)?.data)
    }

    pub fn write_tree(&self, tree: &Tree) -> StoreResult<Oid> {
        let _gate = self.lock();
        self.objects.write(&tree.to_stored_object()?)
    }

    pub fn read_tree(&self, id: &Oid) -> StoreResult<Tree> {
        let _gate = self.lock();
        let obj = self.objects.read(id)?.ok_or(StoreError::ObjectNotFound(*id))?;
        Tree::from_stored_object(obj)
    }

    /// Store a commit object. Branches are not moved.
    pub fn create_commit(&self, commit: &Commit) -> StoreResult<Oid> {
        let _gate = self.lock();
        let id = self.objects.write(&commit.to_stored_object()?)?;
        debug!(id = %id.short_hex(), parents = commit.parents.len(), "commit created");
        Ok(id)
    }

    pub fn read_commit(&self, id: &Oid) -> StoreResult<Commit> {
        let _gate = self.lock();
        history::load_commit(&self.objects, id)
    }

    pub fn has_object(&self, id: &Oid) -> StoreResult<bool> {
        let _gate = self.lock();
        self.objects.exists(id)
    }

    /// Number of objects in the database.
    pub fn object_count(&self) -> StoreResult<usize> {
        let _gate = self.lock();
        self.objects.count()
    }

    // -- refs ---------------------------------------------------------------

    /// Resolve a branch name or canonical ref to its target.
    pub fn resolve_ref(&self, name: &str) -> StoreResult<Oid> {
        self.try_resolve_ref(name)?
            .ok_or_else(|| StoreError::BranchNotFound(name.to_string()))
    }

    /// Like [`Repository::resolve_ref`], but `Ok(None)` when absent.
    pub fn try_resolve_ref(&self, name: &str) -> StoreResult<Option<Oid>> {
        let _gate = self.lock();
        self.refs.read_ref(&canonical(name))
    }

    /// Local branch names, sorted.
    pub fn list_branches(&self) -> StoreResult<Vec<String>> {
        let _gate = self.lock();
        Ok(self
            .refs
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .filter_map(|(name, _)| name.strip_prefix(HEADS_PREFIX).map(str::to_string))
            .collect())
    }

    /// Create or overwrite a ref unconditionally.
    pub fn write_ref(&self, name: &str, target: &Oid) -> StoreResult<()> {
        let _gate = self.lock();
        self.refs.write_ref(&canonical(name), target)
    }

    /// Move a ref only if it still points at `expected` (`None` = absent).
    pub fn compare_and_swap_ref(&self, name: &str, expected: Option<Oid>, target: &Oid) -> StoreResult<()> {
        let _gate = self.lock();
        self.refs.compare_and_swap(&canonical(name), expected, target)
    }

    pub fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        let _gate = self.lock();
        self.refs.delete_ref(&canonical(name))
    }

    // -- history ------------------------------------------------------------

    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> StoreResult<bool> {
        let _gate = self.lock();
        history::is_ancestor(&self.objects, ancestor, descendant)
    }

    pub fn merge_base(&self, a: &Oid, b: &Oid) -> StoreResult<Option<Oid>> {
        let _gate = self.lock();
        history::merge_base(&self.objects, a, b)
    }

    /// Fast-forward branch `to` onto `from` (a branch or canonical ref).
    ///
    /// Creates `to` when absent and leaves it alone when it already contains
    /// `from`. Diverged histories fail with [`StoreError::NotFastForward`].
    pub fn merge_branches(&self, to: &str, from: &str) -> StoreResult<()> {
        let _gate = self.lock();
        let theirs = self
            .refs
            .read_ref(&canonical(from))?
            .ok_or_else(|| StoreError::BranchNotFound(from.to_string()))?;
        let name = canonical(to);
        let ours = self.refs.read_ref(&name)?;
        match ours {
            Some(ours) if history::is_ancestor(&self.objects, &theirs, &ours)? => return Ok(()),
            Some(ours) if !history::is_ancestor(&self.objects, &ours, &theirs)? => {
                return Err(StoreError::NotFastForward(name));
            }
            _ => {}
        }
        self.refs.compare_and_swap(&name, ours, &theirs)?;
        debug!(branch = %name, target = %theirs.short_hex(), "fast-forwarded");
        Ok(())
    }

    // -- remotes ------------------------------------------------------------

    /// Record a remote in the repository config.
    pub fn add_remote(&self, name: &str, url: &str) -> StoreResult<()> {
        validate_remote_name(name)?;
        let _gate = self.lock();
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.remotes.insert(name.to_string(), RemoteConfig { url: url.to_string() });
        config.save(&self.gitdir)
    }

    /// Use `transport` for remote `name` instead of one derived from its url.
    pub fn set_transport(&self, name: &str, transport: Arc<dyn RemoteTransport>) {
        self.transports
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), transport);
    }

    fn remote_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .remotes
            .keys()
            .cloned()
            .collect();
        names.extend(self.transports.read().unwrap_or_else(|e| e.into_inner()).keys().cloned());
        names
    }

    fn transport(&self, name: &str) -> StoreResult<Arc<dyn RemoteTransport>> {
        if let Some(t) = self.transports.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Ok(Arc::clone(t));
        }
        let url = self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .remote_url(name)?
            .to_string();
        Ok(Arc::new(open_transport(&url)?))
    }

    /// Download new objects from every remote and mirror their branch heads
    /// into `refs/remotes/<remote>/*`.
    pub fn fetch_all(&self) -> StoreResult<()> {
        let _gate = self.lock();
        for remote in self.remote_names() {
            let transport = self.transport(&remote)?;
            let heads = transport.list_heads()?;
            let mut copied = 0;
            for (_, oid) in &heads {
                copied += copy_reachable(
                    oid,
                    |id| transport.read_object(id),
                    |id| self.objects.exists(id),
                    |obj| self.objects.write(obj),
                )?;
            }

            let prefix = remote_ref(&remote, "");
            for (name, _) in self.refs.list_refs(&prefix)? {
                let branch = name.strip_prefix(&prefix).unwrap_or_default();
                if !heads.iter().any(|(b, _)| b == branch) {
                    self.refs.delete_ref(&name)?;
                }
            }
            for (branch, oid) in &heads {
                self.refs.write_ref(&remote_ref(&remote, branch), oid)?;
            }
            debug!(remote = %remote, heads = heads.len(), objects = copied, "fetched");
        }
        Ok(())
    }

    /// Send `local_branch` to `remote` as `remote_branch`.
    ///
    /// Without `force` the remote update must be a fast-forward. On success
    /// the local tracking ref follows the remote branch.
    pub fn push(&self, remote: &str, local_branch: &str, remote_branch: &str, force: bool) -> StoreResult<()> {
        validate_branch_name(remote_branch)?;
        let _gate = self.lock();
        let transport = self.transport(remote)?;
        let target = self
            .refs
            .read_ref(&canonical(local_branch))?
            .ok_or_else(|| StoreError::BranchNotFound(local_branch.to_string()))?;
        let copied = copy_reachable(
            &target,
            |id| self.objects.read(id),
            |id| transport.has_object(id),
            |obj| transport.write_object(obj),
        )?;
        transport.update_head(remote_branch, &target, None, force)?;
        self.refs.write_ref(&remote_ref(remote, remote_branch), &target)?;
        debug!(remote, branch = remote_branch, target = %target.short_hex(), objects = copied, force, "pushed");
        Ok(())
    }
}
