//! Incremental indexing of a data source.
//!
//! An [`Indexer`] hands out [`Updater`]s pinned to the current head of the
//! source's branch. `Updater::update_content` diffs that head against the
//! commit recorded by the previous run and feeds the difference to an
//! [`IndexOps`] sink; the returned [`IndexMeta`] is the input to the next run.

use std::sync::Arc;

use docket_change::ORIGIN;
use docket_diff::{index_document, stamp, Gather, IndexOps, PathFilter, TreeDiffer};
use docket_store::names::remote_ref;
use docket_store::Repository;
use docket_types::Oid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SdkResult;
use crate::paths::filename_for;
use crate::source::DataSource;

/// Progress marker persisted between indexing runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Last commit fully indexed.
    pub commit: Option<Oid>,
}

/// A document likely to need reindexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: String,
}

#[derive(Debug)]
pub struct Indexer {
    source: DataSource,
}

impl Indexer {
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Bring the branch up to date and pin an [`Updater`] to its head.
    ///
    /// Remote sources fetch first and fast-forward the local branch, creating
    /// it from the remote head when it does not exist yet.
    pub fn begin_update(&self) -> SdkResult<Updater> {
        let repo = Arc::clone(self.source.repo());
        let branch = self.source.config().target_branch();
        if self.source.config().remote.is_some() {
            pull(&repo, &branch)?;
        }
        let commit = repo.resolve_ref(&branch)?;
        let tree = repo.read_commit(&commit)?.tree;
        debug!(branch = %branch, commit = %commit.short_hex(), "update started");
        Ok(Updater {
            repo,
            branch,
            base_path: self.source.config().base_path_segments(),
            commit,
            tree,
        })
    }
}

fn pull(repo: &Repository, branch: &str) -> SdkResult<()> {
    info!(branch, "pulling remote changes");
    repo.fetch_all()?;
    let tracking = remote_ref(ORIGIN, branch);
    if repo.try_resolve_ref(&tracking)?.is_some() {
        repo.merge_branches(branch, &tracking)?;
    }
    Ok(())
}

/// One indexing pass over a fixed commit.
#[derive(Debug)]
pub struct Updater {
    repo: Arc<Repository>,
    branch: String,
    base_path: Vec<String>,
    commit: Oid,
    tree: Oid,
}

impl Updater {
    pub fn commit(&self) -> Oid {
        self.commit
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn differ(&self) -> TreeDiffer<'_> {
        TreeDiffer::new(&self.repo, self.commit, &self.base_path)
    }

    /// Every schema document in the source.
    pub fn schema(&self) -> SdkResult<Vec<Value>> {
        let mut gather = Gather::default();
        let filter = PathFilter::under(&self.base_path, &["schema"]);
        self.differ().index_tree(&mut gather, None, Some(&self.tree), &filter)?;
        Ok(gather
            .documents
            .into_iter()
            .map(|mut doc| doc.get_mut("data").map(Value::take).unwrap_or(doc))
            .collect())
    }

    /// Send `ops` everything that changed since `meta.commit`.
    ///
    /// When the previous commit cannot be loaded the whole source is
    /// reindexed inside `begin_replace_all`/`finish_replace_all`. `hints` are
    /// advisory; every change is discovered from the trees regardless.
    pub fn update_content(&self, meta: &IndexMeta, hints: &[DocRef], ops: &mut dyn IndexOps) -> SdkResult<IndexMeta> {
        debug!(branch = %self.branch, hints = hints.len(), "updating content");
        let previous = meta.commit.and_then(|commit| match self.repo.read_commit(&commit) {
            Ok(commit) => Some(commit.tree),
            Err(e) => {
                warn!(
                    commit = %commit,
                    error = %e,
                    "unable to load previously indexed commit, reindexing all content"
                );
                None
            }
        });

        let filter = PathFilter::under(&self.base_path, &["schema", "contents", "cards"]);
        if previous.is_none() {
            ops.begin_replace_all()?;
        }
        self.differ().index_tree(ops, previous.as_ref(), Some(&self.tree), &filter)?;
        if previous.is_none() {
            ops.finish_replace_all()?;
        }
        debug!(branch = %self.branch, commit = %self.commit.short_hex(), "content updated");
        Ok(IndexMeta {
            commit: Some(self.commit),
        })
    }

    /// Read one document at its conventional path, stamped like an indexed one.
    pub fn read(&self, doc_type: &str, id: &str, is_schema: bool) -> SdkResult<Option<Value>> {
        let path = filename_for(&self.base_path, doc_type, id, is_schema);
        let mut current = self.tree;
        let mut parts = path.split('/').peekable();
        while let Some(part) = parts.next() {
            let tree = self.repo.read_tree(&current)?;
            let Some(entry) = tree.get(part) else {
                return Ok(None);
            };
            if parts.peek().is_some() {
                if !entry.mode.is_tree() {
                    return Ok(None);
                }
                current = entry.oid;
                continue;
            }
            if entry.mode.is_tree() {
                return Ok(None);
            }
            let bytes = self.repo.read_blob(&entry.oid)?;
            let doc = match serde_json::from_slice::<Value>(&bytes) {
                Ok(doc @ Value::Object(_)) => doc,
                _ => {
                    warn!(path = %path, "ignoring record with invalid json");
                    return Ok(None);
                }
            };
            let doc = stamp(doc, doc_type, id, &self.commit, &entry.oid);
            return Ok(Some(index_document(doc_type, id, doc)));
        }
        Ok(None)
    }
}
