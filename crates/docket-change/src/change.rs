//! Transactions: stage edits against a parent commit, then land them.

use std::path::Path;
use std::sync::Arc;

use docket_merge::{perform_merge, MergeError};
use docket_store::names::{branch_ref, remote_ref};
use docket_store::{Commit, EntryMode, Repository, StoreResult};
use docket_tree::TreeOverlay;
use docket_types::Oid;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ChangeError, ChangeResult};
use crate::handle::{Access, FileHandle};
use crate::options::{CommitOptions, RetryPolicy};

/// Remote every remote-mode change lands on.
pub const ORIGIN: &str = "origin";

/// Where a change lands its commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingMode {
    /// Move the local branch.
    #[default]
    Local,
    /// Push to the branch on `origin`.
    Remote,
}

/// Current head of `branch`: the local branch, or `origin`'s as last fetched.
pub fn head_commit(repo: &Repository, branch: &str, mode: LandingMode) -> StoreResult<Option<Oid>> {
    match mode {
        LandingMode::Local => repo.try_resolve_ref(&branch_ref(branch)),
        LandingMode::Remote => repo.try_resolve_ref(&remote_ref(ORIGIN, branch)),
    }
}

/// A transaction against one branch.
///
/// Edits go into an in-memory [`TreeOverlay`] rooted at the parent commit's
/// tree. [`Change::finalize`] commits them and lands the commit on the
/// target branch, merging with whatever landed in the meantime.
#[derive(Debug)]
pub struct Change {
    repo: Arc<Repository>,
    target_branch: String,
    parent_commit: Option<Oid>,
    root: TreeOverlay,
    mode: LandingMode,
    retry: RetryPolicy,
}

impl Change {
    fn new(repo: Arc<Repository>, target_branch: &str, parent_commit: Option<Oid>, mode: LandingMode) -> ChangeResult<Self> {
        let root = match parent_commit {
            Some(parent) => {
                let tree = repo.read_commit(&parent)?.tree;
                TreeOverlay::load(Arc::clone(&repo), &tree)?
            }
            None => TreeOverlay::new(Arc::clone(&repo)),
        };
        Ok(Self {
            repo,
            target_branch: target_branch.to_string(),
            parent_commit,
            root,
            mode,
            retry: RetryPolicy::default(),
        })
    }

    /// Initialise a bare repository at `path` and start its first commit.
    pub fn create_initial(path: impl AsRef<Path>, target_branch: &str) -> ChangeResult<Self> {
        let repo = Arc::new(Repository::init_bare(path)?);
        Self::new(repo, target_branch, None, LandingMode::Local)
    }

    /// Start a local change on top of `parent` (or an empty tree).
    pub fn create_branch(repo: Arc<Repository>, parent: Option<Oid>, target_branch: &str) -> ChangeResult<Self> {
        Self::new(repo, target_branch, parent, LandingMode::Local)
    }

    /// Start a change on `parent`, defaulting to the branch head for `mode`.
    pub fn create(
        repo: Arc<Repository>,
        parent: Option<Oid>,
        target_branch: &str,
        mode: LandingMode,
    ) -> ChangeResult<Self> {
        let parent = match parent {
            Some(parent) => Some(parent),
            None => head_commit(&repo, target_branch, mode)?,
        };
        Self::new(repo, target_branch, parent, mode)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    pub fn parent_commit(&self) -> Option<Oid> {
        self.parent_commit
    }

    pub fn mode(&self) -> LandingMode {
        self.mode
    }

    pub(crate) fn overlay(&self) -> &TreeOverlay {
        &self.root
    }

    pub(crate) fn overlay_mut(&mut self) -> &mut TreeOverlay {
        &mut self.root
    }

    /// Open a handle on the file at `path`.
    ///
    /// Without [`Access::allow_create`] every directory and the file itself
    /// must exist. Looking a path up never changes the resulting commit.
    pub fn get(&mut self, path: &str, access: Access) -> ChangeResult<FileHandle> {
        let leaf = self.root.file_at_path(path, access.allow_create)?;
        let mode = self
            .root
            .entry(leaf.tree, &leaf.name)
            .filter(|e| leaf.exists && e.is_blob())
            .map_or(EntryMode::Blob, |e| e.mode);
        Ok(FileHandle {
            tree: leaf.tree,
            name: leaf.name,
            path: path.to_string(),
            allow_update: access.allow_update,
            mode,
        })
    }

    /// Commit the staged edits and land them on the target branch.
    ///
    /// Without edits the parent commit is landed as is. Each attempt reads
    /// the branch head, fast-forwards or builds a merge commit, then moves
    /// the branch (local mode, compare-and-swap) or force-pushes to `origin`
    /// (remote mode). Remote retries fetch before reading the head again.
    /// Failed attempts back off according to the [`RetryPolicy`]; merge
    /// conflicts are returned immediately. Returns the id of the landed
    /// commit.
    pub async fn finalize(&mut self, opts: &CommitOptions) -> ChangeResult<Oid> {
        let new_commit = self.make_commit(opts)?;
        let attempts = self.retry.max_attempts();
        let mut delay = self.retry.initial_backoff();
        let mut needs_fetch = false;

        for attempt in 1..=attempts {
            match self.land(&new_commit, opts, needs_fetch) {
                Ok(landed) => {
                    if self.mode == LandingMode::Remote && !self.repo.is_bare() {
                        self.repo.fetch_all()?;
                        self.repo
                            .merge_branches(&self.target_branch, &remote_ref(ORIGIN, &self.target_branch))?;
                    }
                    info!(branch = %self.target_branch, commit = %landed.short_hex(), attempt, "commit landed");
                    return Ok(landed);
                }
                Err(e @ ChangeError::Merge(MergeError::Conflict { .. })) => return Err(e),
                Err(e) => {
                    warn!(
                        branch = %self.target_branch,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "failed to finalize commit"
                    );
                    needs_fetch = true;
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
        Err(ChangeError::RecoveryImpossible { attempts })
    }

    /// One landing attempt; returns the commit now at the head of the branch.
    fn land(&self, new_commit: &Oid, opts: &CommitOptions, fetch: bool) -> ChangeResult<Oid> {
        if fetch && self.mode == LandingMode::Remote {
            self.repo.fetch_all()?;
        }
        let (head, landed) = self.merge_commit(new_commit, opts)?;
        match self.mode {
            LandingMode::Local => self.apply_commit(head, &landed)?,
            LandingMode::Remote => self.push_commit(&landed)?,
        }
        Ok(landed)
    }

    fn make_commit(&mut self, opts: &CommitOptions) -> ChangeResult<Oid> {
        if !self.root.is_dirty(TreeOverlay::ROOT) {
            if let Some(parent) = self.parent_commit {
                return Ok(parent);
            }
        }
        let tree = match self.root.write(true)? {
            Some(tree) => tree,
            None => self.repo.write_tree(&docket_store::Tree::empty())?,
        };
        let commit = Commit {
            tree,
            parents: self.parent_commit.into_iter().collect(),
            author: opts.author.clone(),
            committer: opts.effective_committer().clone(),
            message: opts.message.clone(),
        };
        Ok(self.repo.create_commit(&commit)?)
    }

    /// The commit to land on top of the observed head, paired with that head.
    fn merge_commit(&self, new_commit: &Oid, opts: &CommitOptions) -> ChangeResult<(Option<Oid>, Oid)> {
        let Some(head) = head_commit(&self.repo, &self.target_branch, self.mode)? else {
            return Ok((None, *new_commit));
        };
        let base = self.repo.merge_base(new_commit, &head)?;
        if base == Some(head) {
            return Ok((Some(head), *new_commit));
        }
        if base == Some(*new_commit) {
            // Head already contains everything in this change.
            return Ok((Some(head), head));
        }
        let message = format!("Clean merge into {}", self.target_branch);
        let merge = perform_merge(
            &self.repo,
            new_commit,
            &head,
            &opts.author,
            opts.effective_committer(),
            &message,
        )?;
        debug!(branch = %self.target_branch, merge = %merge.short_hex(), "merged with moved head");
        Ok((Some(head), merge))
    }

    fn apply_commit(&self, head: Option<Oid>, commit: &Oid) -> ChangeResult<()> {
        Ok(self
            .repo
            .compare_and_swap_ref(&branch_ref(&self.target_branch), head, commit)?)
    }

    fn push_commit(&self, commit: &Oid) -> ChangeResult<()> {
        let temp = format!("temp-remote-{}", hex::encode(rand::random::<[u8; 20]>()));
        self.repo.write_ref(&temp, commit)?;
        let pushed = self.repo.push(ORIGIN, &temp, &self.target_branch, true);
        self.repo.delete_ref(&temp)?;
        if let Err(e) = pushed {
            self.repo.fetch_all()?;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_store::{LocalTransport, RemoteTransport, StoreError, StoredObject};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn opts(message: &str) -> CommitOptions {
        CommitOptions::new(message, "Ada", "ada@example.com")
    }

    fn write(change: &mut Change, path: &str, content: &str) {
        let handle = change.get(path, Access::UPSERT).unwrap();
        handle.set_content(change, content).unwrap();
    }

    fn read(repo: &Arc<Repository>, commit: &Oid, path: &str) -> Option<String> {
        let tree = repo.read_commit(commit).unwrap().tree;
        let mut overlay = TreeOverlay::load(Arc::clone(repo), &tree).unwrap();
        let leaf = overlay.file_at_path(path, false).ok()?;
        let bytes = overlay.read_leaf(leaf.tree, &leaf.name).unwrap()?;
        Some(String::from_utf8(bytes).unwrap())
    }

    async fn seeded(dir: &Path) -> (Arc<Repository>, Oid) {
        let mut change = Change::create_initial(dir, "master").unwrap();
        write(&mut change, "contents/events/1.json", "{}");
        let first = change.finalize(&opts("First commit")).await.unwrap();
        (Arc::clone(change.repo()), first)
    }

    #[tokio::test]
    async fn initial_change_creates_branch() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first) = seeded(dir.path()).await;
        assert_eq!(repo.resolve_ref("master").unwrap(), first);
        let commit = repo.read_commit(&first).unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.message, "First commit");
        assert_eq!(read(&repo, &first, "contents/events/1.json").as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn sequential_change_fast_forwards() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first) = seeded(dir.path()).await;
        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Local).unwrap();
        assert_eq!(change.parent_commit(), Some(first));
        write(&mut change, "contents/events/2.json", "{\"n\":2}");
        let second = change.finalize(&opts("second")).await.unwrap();

        assert_eq!(repo.resolve_ref("master").unwrap(), second);
        assert_eq!(repo.read_commit(&second).unwrap().parents, vec![first]);
    }

    #[tokio::test]
    async fn concurrent_changes_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first) = seeded(dir.path()).await;

        let mut a = Change::create_branch(Arc::clone(&repo), Some(first), "master").unwrap();
        let mut b = Change::create_branch(Arc::clone(&repo), Some(first), "master").unwrap();
        write(&mut a, "contents/events/a.json", "a");
        write(&mut b, "contents/events/b.json", "b");

        let landed_a = a.finalize(&opts("a")).await.unwrap();
        let landed_b = b.finalize(&opts("b")).await.unwrap();

        let head = repo.resolve_ref("master").unwrap();
        assert_eq!(head, landed_b);
        let merge = repo.read_commit(&head).unwrap();
        assert_eq!(merge.parents.len(), 2);
        assert_eq!(merge.parents[1], landed_a);
        assert_eq!(merge.message, "Clean merge into master");
        assert_eq!(read(&repo, &head, "contents/events/a.json").as_deref(), Some("a"));
        assert_eq!(read(&repo, &head, "contents/events/b.json").as_deref(), Some("b"));
        assert_eq!(read(&repo, &head, "contents/events/1.json").as_deref(), Some("{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn conflicting_changes_fail_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first) = seeded(dir.path()).await;

        let mut a = Change::create_branch(Arc::clone(&repo), Some(first), "master").unwrap();
        let mut b = Change::create_branch(Arc::clone(&repo), Some(first), "master").unwrap();
        write(&mut a, "contents/events/1.json", "a");
        write(&mut b, "contents/events/1.json", "b");
        let landed_a = a.finalize(&opts("a")).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = b.finalize(&opts("b")).await.unwrap_err();
        assert!(matches!(err, ChangeError::Merge(MergeError::Conflict { .. })));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(repo.resolve_ref("master").unwrap(), landed_a);
    }

    #[tokio::test]
    async fn noop_finalize_returns_parent() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first) = seeded(dir.path()).await;
        let objects = repo.object_count().unwrap();

        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Local).unwrap();
        let handle = change.get("contents/new/x.json", Access::CREATE).unwrap();
        assert!(!handle.exists(&change));

        assert_eq!(change.finalize(&opts("nothing")).await.unwrap(), first);
        assert_eq!(repo.object_count().unwrap(), objects);
        assert_eq!(repo.resolve_ref("master").unwrap(), first);
    }

    #[tokio::test]
    async fn overwrite_requires_allow_update() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, _) = seeded(dir.path()).await;
        let mut change = Change::create(repo, None, "master", LandingMode::Local).unwrap();

        let handle = change.get("contents/events/1.json", Access::CREATE).unwrap();
        assert!(handle.exists(&change));
        let err = handle.set_content(&mut change, "replaced").unwrap_err();
        assert!(matches!(err, ChangeError::OverwriteRejected(ref p) if p == "contents/events/1.json"));

        let handle = change.get("contents/events/1.json", Access::UPDATE).unwrap();
        handle.set_content(&mut change, "replaced").unwrap();
        assert_eq!(handle.get_buffer(&change).unwrap().unwrap(), b"replaced");
        assert_eq!(handle.saved_id(&change), None);

        let landed = change.finalize(&opts("update")).await.unwrap();
        let saved = handle.saved_id(&change).unwrap();
        assert_eq!(change.repo().read_blob(&saved).unwrap(), b"replaced");
        assert_eq!(
            read(change.repo(), &landed, "contents/events/1.json").as_deref(),
            Some("replaced")
        );
    }

    #[tokio::test]
    async fn missing_files_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, _) = seeded(dir.path()).await;
        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Local).unwrap();

        assert!(matches!(
            change.get("contents/events/9.json", Access::READ),
            Err(ChangeError::Tree(docket_tree::TreeError::LeafNotFound(_)))
        ));
        assert!(matches!(
            change.get("contents/people/1.json", Access::UPDATE),
            Err(ChangeError::Tree(docket_tree::TreeError::PathNotFound(_)))
        ));

        let handle = change.get("contents/events/1.json", Access::READ).unwrap();
        handle.delete(&mut change).unwrap();
        assert!(!handle.exists(&change));
        assert!(matches!(
            handle.delete(&mut change),
            Err(ChangeError::Tree(docket_tree::TreeError::LeafNotFound(_)))
        ));

        let landed = change.finalize(&opts("delete")).await.unwrap();
        let tree = repo.read_tree(&repo.read_commit(&landed).unwrap().tree).unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn remote_mode_pushes_and_updates_clone() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let (upstream, first) = seeded(upstream_dir.path()).await;

        let work = tempfile::tempdir().unwrap();
        let url = format!("file://{}", upstream_dir.path().display());
        let local = Arc::new(Repository::clone(&url, work.path().join("clone")).unwrap());

        let mut change = Change::create(Arc::clone(&local), None, "master", LandingMode::Remote).unwrap();
        assert_eq!(change.parent_commit(), Some(first));
        write(&mut change, "cards/c::1.json", "card");
        let landed = change.finalize(&opts("remote")).await.unwrap();

        assert_eq!(upstream.resolve_ref("master").unwrap(), landed);
        assert_eq!(local.resolve_ref("master").unwrap(), landed);
        assert_eq!(local.resolve_ref("refs/remotes/origin/master").unwrap(), landed);
        assert_eq!(local.list_branches().unwrap(), ["master"]);
        assert_eq!(upstream.list_branches().unwrap(), ["master"]);
    }

    /// Accepts objects but refuses every branch update.
    #[derive(Default)]
    struct RejectingTransport {
        updates: AtomicUsize,
    }

    impl RemoteTransport for RejectingTransport {
        fn list_heads(&self) -> StoreResult<Vec<(String, Oid)>> {
            Ok(Vec::new())
        }

        fn read_object(&self, _id: &Oid) -> StoreResult<Option<StoredObject>> {
            Ok(None)
        }

        fn has_object(&self, _id: &Oid) -> StoreResult<bool> {
            Ok(false)
        }

        fn write_object(&self, object: &StoredObject) -> StoreResult<Oid> {
            Ok(object.compute_id())
        }

        fn update_head(&self, _branch: &str, _target: &Oid, _expected: Option<Oid>, _force: bool) -> StoreResult<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Transport("connection reset".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(Repository::init_bare(dir.path()).unwrap());
        let transport = Arc::new(RejectingTransport::default());
        repo.set_transport(ORIGIN, transport.clone());

        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Remote).unwrap();
        write(&mut change, "contents/events/1.json", "{}");

        let started = tokio::time::Instant::now();
        let err = change.finalize(&opts("doomed")).await.unwrap_err();
        assert!(matches!(err, ChangeError::RecoveryImpossible { attempts: 4 }));
        assert_eq!(transport.updates.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_millis(7500));
        // Temporary branches never outlive an attempt.
        assert!(repo.list_branches().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_policy_gives_up_sooner() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(Repository::init_bare(dir.path()).unwrap());
        repo.set_transport(ORIGIN, Arc::new(RejectingTransport::default()));

        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Remote)
            .unwrap()
            .with_retry_policy(RetryPolicy {
                initial_backoff_ms: 10,
                max_backoff_ms: 20,
            });
        write(&mut change, "a.json", "{}");
        let err = change.finalize(&opts("doomed")).await.unwrap_err();
        assert!(matches!(err, ChangeError::RecoveryImpossible { attempts: 2 }));
    }

    /// Upstream that drops the first push and lets another writer land
    /// during the second listing of its heads.
    struct RacingUpstream {
        inner: LocalTransport,
        upstream: Arc<Repository>,
        concurrent: Oid,
        listings: AtomicUsize,
        pushes: AtomicUsize,
    }

    impl RemoteTransport for RacingUpstream {
        fn list_heads(&self) -> StoreResult<Vec<(String, Oid)>> {
            if self.listings.fetch_add(1, Ordering::SeqCst) == 1 {
                self.upstream.write_ref("master", &self.concurrent)?;
            }
            self.inner.list_heads()
        }

        fn read_object(&self, id: &Oid) -> StoreResult<Option<StoredObject>> {
            self.inner.read_object(id)
        }

        fn has_object(&self, id: &Oid) -> StoreResult<bool> {
            self.inner.has_object(id)
        }

        fn write_object(&self, object: &StoredObject) -> StoreResult<Oid> {
            self.inner.write_object(object)
        }

        fn update_head(&self, branch: &str, target: &Oid, expected: Option<Oid>, force: bool) -> StoreResult<()> {
            if self.pushes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Transport("connection reset".into()));
            }
            self.inner.update_head(branch, target, expected, force)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn remote_retry_keeps_concurrent_commits() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let (upstream, first) = seeded(upstream_dir.path()).await;

        // A commit another writer will land upstream mid-retry.
        let mut other = Change::create_branch(Arc::clone(&upstream), Some(first), "side").unwrap();
        write(&mut other, "contents/events/other.json", "other");
        let concurrent = other.finalize(&opts("other")).await.unwrap();
        upstream.delete_ref("side").unwrap();

        let work = tempfile::tempdir().unwrap();
        let url = upstream_dir.path().to_string_lossy().into_owned();
        let local = Arc::new(Repository::clone(&url, work.path().join("clone")).unwrap());
        let transport = Arc::new(RacingUpstream {
            inner: LocalTransport::open(upstream_dir.path()).unwrap(),
            upstream: Arc::clone(&upstream),
            concurrent,
            listings: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
        });
        local.set_transport(ORIGIN, transport.clone());

        let mut change = Change::create(Arc::clone(&local), None, "master", LandingMode::Remote).unwrap();
        write(&mut change, "contents/events/mine.json", "mine");
        let landed = change.finalize(&opts("mine")).await.unwrap();

        assert_eq!(transport.pushes.load(Ordering::SeqCst), 2);
        assert_eq!(upstream.resolve_ref("master").unwrap(), landed);
        assert!(upstream.is_ancestor(&concurrent, &landed).unwrap());
        assert_eq!(read(&upstream, &landed, "contents/events/mine.json").as_deref(), Some("mine"));
        assert_eq!(read(&upstream, &landed, "contents/events/other.json").as_deref(), Some("other"));
    }

    #[tokio::test(start_paused = true)]
    async fn store_errors_while_merging_are_retried() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let (upstream, first) = seeded(upstream_dir.path()).await;
        let work = tempfile::tempdir().unwrap();
        let url = upstream_dir.path().to_string_lossy().into_owned();
        let local = Arc::new(Repository::clone(&url, work.path().join("clone")).unwrap());

        let mut other = Change::create_branch(Arc::clone(&upstream), Some(first), "master").unwrap();
        write(&mut other, "contents/events/other.json", "other");
        let moved = other.finalize(&opts("other")).await.unwrap();
        // Tracking ref points at a commit whose objects were never fetched.
        local.write_ref("refs/remotes/origin/master", &moved).unwrap();
        assert!(!local.has_object(&moved).unwrap());

        let mut change = Change::create(Arc::clone(&local), Some(first), "master", LandingMode::Remote).unwrap();
        write(&mut change, "contents/events/mine.json", "mine");
        let started = tokio::time::Instant::now();
        let landed = change.finalize(&opts("mine")).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(upstream.resolve_ref("master").unwrap(), landed);
        assert_eq!(read(&upstream, &landed, "contents/events/other.json").as_deref(), Some("other"));
        assert_eq!(read(&upstream, &landed, "contents/events/mine.json").as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn lookups_through_a_file_do_not_drop_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut change = Change::create_initial(dir.path(), "master").unwrap();
        write(&mut change, "notes", "plain text");
        write(&mut change, "b.json", "{}");
        let first = change.finalize(&opts("First commit")).await.unwrap();
        let repo = Arc::clone(change.repo());

        let mut change = Change::create(Arc::clone(&repo), None, "master", LandingMode::Local).unwrap();
        let notes = change.get("notes", Access::READ).unwrap();
        assert!(matches!(
            change.get("notes/x.json", Access::CREATE),
            Err(ChangeError::Tree(docket_tree::TreeError::PathNotFound(_)))
        ));
        assert!(notes.exists(&change));

        let b = change.get("b.json", Access::UPDATE).unwrap();
        b.set_content(&mut change, "{\"v\":2}").unwrap();
        let landed = change.finalize(&opts("update b")).await.unwrap();

        assert_eq!(read(&repo, &first, "notes").as_deref(), Some("plain text"));
        assert_eq!(read(&repo, &landed, "notes").as_deref(), Some("plain text"));
        assert_eq!(read(&repo, &landed, "b.json").as_deref(), Some("{\"v\":2}"));
    }
}
