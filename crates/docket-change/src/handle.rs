use docket_store::EntryMode;
use docket_tree::{NodeId, OverlayEntry, TreeError};
use docket_types::Oid;

use crate::change::Change;
use crate::error::{ChangeError, ChangeResult};

/// What a caller may do through a [`FileHandle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Access {
    /// Create missing directories and allow a missing file.
    pub allow_create: bool,
    /// Allow replacing an existing file.
    pub allow_update: bool,
}

impl Access {
    pub const READ: Self = Self {
        allow_create: false,
        allow_update: false,
    };
    pub const CREATE: Self = Self {
        allow_create: true,
        allow_update: false,
    };
    pub const UPDATE: Self = Self {
        allow_create: false,
        allow_update: true,
    };
    pub const UPSERT: Self = Self {
        allow_create: true,
        allow_update: true,
    };
}

/// A file location inside one [`Change`].
///
/// Handles are plain values; every operation takes the change that issued
/// the handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle {
    pub(crate) tree: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) allow_update: bool,
    pub(crate) mode: EntryMode,
}

impl FileHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    fn leaf<'a>(&self, change: &'a Change) -> Option<&'a OverlayEntry> {
        change
            .overlay()
            .entry(self.tree, &self.name)
            .filter(|e| e.is_blob())
    }

    pub fn exists(&self, change: &Change) -> bool {
        self.leaf(change).is_some()
    }

    /// Current content, including edits staged in this change.
    pub fn get_buffer(&self, change: &Change) -> ChangeResult<Option<Vec<u8>>> {
        Ok(change.overlay().read_leaf(self.tree, &self.name)?)
    }

    pub fn set_content(&self, change: &mut Change, content: impl Into<Vec<u8>>) -> ChangeResult<()> {
        if !self.allow_update && self.exists(change) {
            return Err(ChangeError::OverwriteRejected(self.path.clone()));
        }
        change
            .overlay_mut()
            .insert(self.tree, &self.name, content.into(), self.mode);
        Ok(())
    }

    pub fn delete(&self, change: &mut Change) -> ChangeResult<()> {
        if !self.exists(change) {
            return Err(TreeError::LeafNotFound(self.path.clone()).into());
        }
        change.overlay_mut().delete(self.tree, &self.name);
        Ok(())
    }

    /// Blob id of the file; only available once the change has been finalized.
    pub fn saved_id(&self, change: &Change) -> Option<Oid> {
        self.leaf(change).and_then(OverlayEntry::saved_id)
    }
}
