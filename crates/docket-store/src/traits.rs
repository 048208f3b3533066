use docket_types::Oid;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object database.
///
/// Implementations must satisfy these invariants:
/// - Objects are immutable once written; the same data always produces the
///   same id.
/// - Writing an object that already exists is a no-op.
/// - There is no deletion primitive.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id. Returns `Ok(None)` if it does not exist.
    fn read(&self, id: &Oid) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed id.
    fn write(&self, object: &StoredObject) -> StoreResult<Oid>;

    /// Check whether an object exists.
    fn exists(&self, id: &Oid) -> StoreResult<bool>;
}

/// Storage backend for named references.
///
/// Names are canonical (`refs/heads/<branch>`, `refs/remotes/<remote>/<branch>`).
pub trait RefStore: Send + Sync {
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> StoreResult<Option<Oid>>;

    /// Create or overwrite a ref.
    fn write_ref(&self, name: &str, target: &Oid) -> StoreResult<()>;

    /// Returns `Ok(true)` if the ref existed and was deleted.
    fn delete_ref(&self, name: &str) -> StoreResult<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, Oid)>>;
}
