use std::sync::Arc;

use docket_store::{EntryMode, Repository, Tree, TreeEntry};
use docket_types::Oid;
use tracing::debug;

use crate::error::{TreeError, TreeResult};

/// Index of a directory node inside one [`TreeOverlay`].
///
/// Ids are only meaningful for the overlay that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a directory entry points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryTarget {
    /// File content: persisted (`oid`) and/or staged (`pending`).
    Blob { oid: Option<Oid>, pending: Option<Vec<u8>> },
    /// Directory: persisted (`oid`) and/or loaded into the overlay (`node`).
    Subtree { oid: Option<Oid>, node: Option<NodeId> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayEntry {
    pub name: String,
    pub mode: EntryMode,
    pub target: EntryTarget,
}

impl OverlayEntry {
    fn from_persisted(entry: TreeEntry) -> Self {
        let target = if entry.mode.is_tree() {
            EntryTarget::Subtree {
                oid: Some(entry.oid),
                node: None,
            }
        } else {
            EntryTarget::Blob {
                oid: Some(entry.oid),
                pending: None,
            }
        };
        Self {
            name: entry.name,
            mode: entry.mode,
            target,
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self.target, EntryTarget::Blob { .. })
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.target, EntryTarget::Subtree { .. })
    }

    /// Persisted id. `None` for content staged since the last write.
    pub fn saved_id(&self) -> Option<Oid> {
        match &self.target {
            EntryTarget::Blob { pending: Some(_), .. } => None,
            EntryTarget::Blob { oid, .. } | EntryTarget::Subtree { oid, .. } => *oid,
        }
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    oid: Option<Oid>,
    entries: Vec<OverlayEntry>,
    dirty: bool,
}

/// Location of a file: the directory node holding it plus its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub tree: NodeId,
    pub name: String,
    /// Whether a file entry currently exists under `name`.
    pub exists: bool,
}

/// Mutable overlay over a persisted tree.
///
/// Directory nodes live in an arena addressed by [`NodeId`]; the root is
/// always [`TreeOverlay::ROOT`]. Subtrees are loaded on first access. A node
/// is dirty when it or anything below it changed since it was loaded or
/// last written.
#[derive(Debug)]
pub struct TreeOverlay {
    repo: Arc<Repository>,
    nodes: Vec<Node>,
}

impl TreeOverlay {
    pub const ROOT: NodeId = NodeId(0);

    /// An empty tree with no persisted counterpart. Starts dirty.
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            nodes: vec![Node {
                parent: None,
                oid: None,
                entries: Vec::new(),
                dirty: true,
            }],
        }
    }

    /// Overlay the persisted tree `id`. Starts clean.
    pub fn load(repo: Arc<Repository>, id: &Oid) -> TreeResult<Self> {
        let tree = repo.read_tree(id)?;
        Ok(Self {
            repo,
            nodes: vec![Node {
                parent: None,
                oid: Some(*id),
                entries: tree.entries.into_iter().map(OverlayEntry::from_persisted).collect(),
                dirty: false,
            }],
        })
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.nodes[node.0].dirty
    }

    /// Id of the node as of its last load or write.
    pub fn node_oid(&self, node: NodeId) -> Option<Oid> {
        self.nodes[node.0].oid
    }

    pub fn entries(&self, node: NodeId) -> &[OverlayEntry] {
        &self.nodes[node.0].entries
    }

    pub fn entry(&self, node: NodeId, name: &str) -> Option<&OverlayEntry> {
        self.nodes[node.0].entries.iter().find(|e| e.name == name)
    }

    fn position(&self, node: NodeId, name: &str) -> Option<usize> {
        self.nodes[node.0].entries.iter().position(|e| e.name == name)
    }

    fn alloc(&mut self, parent: NodeId, oid: Option<Oid>, entries: Vec<OverlayEntry>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            oid,
            entries,
            dirty: oid.is_none(),
        });
        id
    }

    fn mark_dirty(&mut self, node: NodeId) {
        let mut current = Some(node);
        while let Some(id) = current {
            let node = &mut self.nodes[id.0];
            node.dirty = true;
            current = node.parent;
        }
    }

    /// The directory `name` under `node`, loading it on first access.
    ///
    /// `Ok(None)` when there is no such entry or it is a file.
    pub fn subtree(&mut self, node: NodeId, name: &str) -> TreeResult<Option<NodeId>> {
        let Some(idx) = self.position(node, name) else {
            return Ok(None);
        };
        let oid = match &self.nodes[node.0].entries[idx].target {
            EntryTarget::Subtree { node: Some(child), .. } => return Ok(Some(*child)),
            EntryTarget::Subtree { oid: Some(oid), node: None } => *oid,
            _ => return Ok(None),
        };
        let tree = self.repo.read_tree(&oid)?;
        let entries = tree.entries.into_iter().map(OverlayEntry::from_persisted).collect();
        let child = self.alloc(node, Some(oid), entries);
        self.nodes[node.0].entries[idx].target = EntryTarget::Subtree {
            oid: Some(oid),
            node: Some(child),
        };
        Ok(Some(child))
    }

    /// Attach a fresh empty directory without dirtying any ancestor.
    ///
    /// It only reaches the written tree once something is inserted below it.
    fn synthesize(&mut self, parent: NodeId, name: &str) -> NodeId {
        let child = self.alloc(parent, None, Vec::new());
        self.nodes[parent.0].entries.push(OverlayEntry {
            name: name.to_string(),
            mode: EntryMode::Tree,
            target: EntryTarget::Subtree {
                oid: None,
                node: Some(child),
            },
        });
        child
    }

    /// Stage `content` as file `name` in `node`, replacing any entry of that name.
    pub fn insert(&mut self, node: NodeId, name: &str, content: Vec<u8>, mode: EntryMode) {
        let entries = &mut self.nodes[node.0].entries;
        entries.retain(|e| e.name != name);
        entries.push(OverlayEntry {
            name: name.to_string(),
            mode,
            target: EntryTarget::Blob {
                oid: None,
                pending: Some(content),
            },
        });
        self.mark_dirty(node);
    }

    /// Remove entry `name` from `node`. Returns whether it existed.
    pub fn delete(&mut self, node: NodeId, name: &str) -> bool {
        match self.position(node, name) {
            Some(idx) => {
                self.nodes[node.0].entries.remove(idx);
                self.mark_dirty(node);
                true
            }
            None => false,
        }
    }

    /// Walk `path` (slash separated) down to the directory holding its last segment.
    ///
    /// Missing directories fail with [`TreeError::PathNotFound`] unless
    /// `allow_create` is set, in which case empty ones are synthesized. A
    /// file standing where a directory is expected always fails; lookups
    /// never replace existing entries.
    pub fn traverse(&mut self, path: &str, allow_create: bool) -> TreeResult<Leaf> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        let Some((leaf, dirs)) = parts.split_last() else {
            return Err(TreeError::InvalidPath(path.to_string()));
        };

        let mut here = Self::ROOT;
        for dir in dirs {
            here = match self.subtree(here, dir)? {
                Some(child) => child,
                None if allow_create && self.position(here, dir).is_none() => self.synthesize(here, dir),
                None => return Err(TreeError::PathNotFound(path.to_string())),
            };
        }
        let exists = self.entry(here, leaf).is_some_and(OverlayEntry::is_blob);
        Ok(Leaf {
            tree: here,
            name: leaf.to_string(),
            exists,
        })
    }

    /// Like [`TreeOverlay::traverse`], but a missing file is an error unless
    /// `allow_create` is set.
    pub fn file_at_path(&mut self, path: &str, allow_create: bool) -> TreeResult<Leaf> {
        let leaf = self.traverse(path, allow_create)?;
        if !leaf.exists && !allow_create {
            return Err(TreeError::LeafNotFound(path.to_string()));
        }
        Ok(leaf)
    }

    /// Content of file `name` in `node`: staged bytes, else the stored blob.
    pub fn read_leaf(&self, node: NodeId, name: &str) -> TreeResult<Option<Vec<u8>>> {
        match self.entry(node, name).map(|e| &e.target) {
            Some(EntryTarget::Blob {
                pending: Some(bytes), ..
            }) => Ok(Some(bytes.clone())),
            Some(EntryTarget::Blob { oid: Some(oid), .. }) => Ok(Some(self.repo.read_blob(oid)?)),
            _ => Ok(None),
        }
    }

    /// Persist every dirty node and return the root tree id.
    ///
    /// Empty directories below the root are dropped. An empty root is only
    /// written when `allow_empty` is set; otherwise the result is `None`.
    pub fn write(&mut self, allow_empty: bool) -> TreeResult<Option<Oid>> {
        self.write_node(Self::ROOT, allow_empty)
    }

    fn write_node(&mut self, id: NodeId, allow_empty: bool) -> TreeResult<Option<Oid>> {
        if !self.nodes[id.0].dirty {
            return Ok(self.nodes[id.0].oid);
        }

        let mut pruned = Vec::new();
        for idx in 0..self.nodes[id.0].entries.len() {
            let child = match &mut self.nodes[id.0].entries[idx].target {
                EntryTarget::Blob { oid, pending } => {
                    let written = match pending.as_deref() {
                        Some(bytes) => Some(self.repo.write_blob(bytes)?),
                        None => None,
                    };
                    if let Some(written) = written {
                        *oid = Some(written);
                        *pending = None;
                    }
                    continue;
                }
                EntryTarget::Subtree { node: Some(child), .. } => *child,
                EntryTarget::Subtree { node: None, .. } => continue,
            };
            let written = self.write_node(child, false)?;
            match written {
                Some(oid) => {
                    self.nodes[id.0].entries[idx].target = EntryTarget::Subtree {
                        oid: Some(oid),
                        node: Some(child),
                    }
                }
                None => pruned.push(idx),
            }
        }
        let node = &mut self.nodes[id.0];
        for idx in pruned.into_iter().rev() {
            node.entries.remove(idx);
        }

        if node.entries.is_empty() && (node.parent.is_some() || !allow_empty) {
            return Ok(None);
        }

        let tree = Tree::new(
            node.entries
                .iter()
                .filter_map(|e| e.saved_id().map(|oid| TreeEntry::new(e.mode, e.name.clone(), oid)))
                .collect(),
        );
        let oid = self.repo.write_tree(&tree)?;
        node.oid = Some(oid);
        node.dirty = false;
        debug!(tree = %oid.short_hex(), entries = tree.len(), "tree written");
        Ok(Some(oid))
    }
}
