use serde::{Deserialize, Serialize};
use docket_types::{Oid, Signature};

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content (file contents).
    Blob,
    /// Directory listing: entries mapping names to object references.
    Tree,
    /// Snapshot record: one tree, its parents and metadata.
    Commit,
}

impl ObjectKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "blob" => Some(Self::Blob),
            "tree" => Some(Self::Tree),
            "commit" => Some(Self::Commit),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Tree => &ContentHasher::TREE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A stored object: kind tag plus serialized data.
///
/// `StoredObject` is the unit of storage and transfer. The object database
/// never interprets `data`; typed views ([`Blob`], [`Tree`], [`Commit`])
/// convert to and from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Content-addressed id, hashed in the kind's own domain.
    pub fn compute_id(&self) -> Oid {
        self.kind.hasher().hash(&self.data)
    }

    /// Frame as `"<kind> <size>\0<data>"`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{} {}\0", self.kind, self.data.len()).into_bytes();
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse a frame produced by [`StoredObject::encode`].
    ///
    /// `id` is only used to label errors.
    pub fn decode(id: &Oid, frame: &[u8]) -> StoreResult<Self> {
        let corrupt = |reason: &str| StoreError::CorruptObject {
            id: *id,
            reason: reason.to_string(),
        };
        let nul = frame
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("missing header terminator"))?;
        let header = std::str::from_utf8(&frame[..nul]).map_err(|_| corrupt("header is not utf-8"))?;
        let (tag, size) = header
            .split_once(' ')
            .ok_or_else(|| corrupt("malformed header"))?;
        let kind = ObjectKind::from_tag(tag).ok_or_else(|| corrupt("unknown object kind"))?;
        let size: usize = size.parse().map_err(|_| corrupt("malformed size"))?;
        let data = &frame[nul + 1..];
        if data.len() != size {
            return Err(corrupt("size does not match header"));
        }
        Ok(Self::new(kind, data.to_vec()))
    }

    fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind != kind {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {kind}, got {}", self.kind),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object. Never mutated: changed content is a new blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self { data: obj.data })
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Subtree / directory (0o040000).
    Tree,
    /// Normal file (0o100644).
    Blob,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Pinned commit of another repository (0o160000).
    Submodule,
}

impl EntryMode {
    /// Octal mode value.
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Tree => 0o040000,
            Self::Blob => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Submodule => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o040000 => Some(Self::Tree),
            0o100644 => Some(Self::Blob),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o160000 => Some(Self::Submodule),
            _ => None,
        }
    }

    /// Whether entries of this mode reference a tree object.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single persisted entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: String,
    pub oid: Oid,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<String>, oid: Oid) -> Self {
        Self {
            mode,
            name: name.into(),
            oid,
        }
    }
}

/// Directory listing object.
///
/// Names are unique within a tree. Entries are kept sorted by name so that
/// equal listings always hash to the same id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree, sorting entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Immutable snapshot record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Commit, data))
    }

    pub fn from_stored_object(obj: StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Commit)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
