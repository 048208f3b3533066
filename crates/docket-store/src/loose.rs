//! Loose-object database on the local filesystem.
//!
//! Each object lives in `objects/<2 hex>/<62 hex>` as a zstd-compressed
//! [`StoredObject`] frame. Files are written to a temporary file in the
//! fan-out directory and renamed into place, so readers never observe a
//! partially written object.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use docket_types::Oid;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

const COMPRESSION_LEVEL: i32 = 3;

/// Filesystem-backed [`ObjectStore`].
#[derive(Debug)]
pub struct LooseObjectStore {
    root: PathBuf,
}

impl LooseObjectStore {
    /// Use `root` (normally `<gitdir>/objects`) as the object directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &Oid) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Number of objects on disk.
    pub fn count(&self) -> StoreResult<usize> {
        let mut count = 0;
        for entry in walkdir::WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if entry.file_type().is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl ObjectStore for LooseObjectStore {
    fn read(&self, id: &Oid) -> StoreResult<Option<StoredObject>> {
        let path = self.path_for(id);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let frame = zstd::decode_all(compressed.as_slice()).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("decompression failed: {e}"),
        })?;
        let object = StoredObject::decode(id, &frame)?;
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<Oid> {
        let id = object.compute_id();
        let path = self.path_for(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(std::io::Error::other("object path has no parent")))?;
        fs::create_dir_all(dir)?;

        let compressed = zstd::encode_all(object.encode().as_slice(), COMPRESSION_LEVEL)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&compressed)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %id.short_hex(), kind = %object.kind, size = object.data.len(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        Ok(self.path_for(id).is_file())
    }
}
