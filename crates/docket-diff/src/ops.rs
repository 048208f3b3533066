use serde_json::Value;

use crate::error::DiffResult;

/// Receiver of index operations produced by the differ.
pub trait IndexOps {
    fn save(&mut self, doc_type: &str, id: &str, doc: Value) -> DiffResult<()>;

    fn delete(&mut self, doc_type: &str, id: &str) -> DiffResult<()>;

    /// Start a full rebuild: everything not saved before
    /// [`IndexOps::finish_replace_all`] is stale.
    fn begin_replace_all(&mut self) -> DiffResult<()> {
        Ok(())
    }

    fn finish_replace_all(&mut self) -> DiffResult<()> {
        Ok(())
    }
}

/// Collects saved documents in memory; deletions are ignored.
#[derive(Debug, Default)]
pub struct Gather {
    pub documents: Vec<Value>,
}

impl IndexOps for Gather {
    fn save(&mut self, _doc_type: &str, _id: &str, doc: Value) -> DiffResult<()> {
        self.documents.push(doc);
        Ok(())
    }

    fn delete(&mut self, _doc_type: &str, _id: &str) -> DiffResult<()> {
        Ok(())
    }
}
