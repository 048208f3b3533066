//! Tree-level diff: compare two trees and emit index operations.
//!
//! Entries are matched by name. Identical ids are skipped without descending,
//! so unchanged subtrees cost one comparison. Changed or added `.json` files
//! are parsed, stamped with version metadata and saved; removed files are
//! deleted.

use docket_store::{EntryMode, Repository, Tree, TreeEntry};
use docket_types::Oid;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::DiffResult;
use crate::filter::PathFilter;
use crate::ops::IndexOps;

/// Separator marking internal (composite) record ids.
const CARD_ID_DELIMITER: &str = "::";

/// Internal records use their id as their type and carry a `::` in the id.
pub fn is_internal_card(doc_type: &str, id: &str) -> bool {
    !id.is_empty() && doc_type == id && id.contains(CARD_ID_DELIMITER)
}

fn strip_json(name: &str) -> &str {
    name.strip_suffix(".json").unwrap_or(name)
}

fn is_json(name: &str) -> bool {
    name.len() >= 5 && name[name.len() - 5..].eq_ignore_ascii_case(".json")
}

/// Document type and id for a file at `path` (relative to the base path).
///
/// `cards/<rest>.json` is an internal record whose type and id are both
/// `<rest>`. Anything else takes its parent directory as the type (`tops` at
/// the top level) and its file name as the id.
pub fn identify(path: &[String]) -> (String, String) {
    match path {
        [first, rest @ ..] if first == "cards" && !rest.is_empty() => {
            let id = strip_json(&rest.join("/")).to_string();
            (id.clone(), id)
        }
        [.., parent, file] => (parent.clone(), strip_json(file).to_string()),
        [file] => ("tops".to_string(), strip_json(file).to_string()),
        [] => ("tops".to_string(), String::new()),
    }
}

fn set_path(doc: &mut Value, keys: &[&str], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut current = doc;
    for key in parents {
        let Some(object) = current.as_object_mut() else {
            return;
        };
        let slot = object.entry(*key).or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot;
    }
    if let Some(object) = current.as_object_mut() {
        object.insert((*last).to_string(), value);
    }
}

/// Walks two trees of one repository and reports their differences to an
/// [`IndexOps`] sink.
#[derive(Debug)]
pub struct TreeDiffer<'a> {
    repo: &'a Repository,
    commit_id: Oid,
    base_path: &'a [String],
}

impl<'a> TreeDiffer<'a> {
    /// `commit_id` is stamped as `meta.version` on every saved document.
    pub fn new(repo: &'a Repository, commit_id: Oid, base_path: &'a [String]) -> Self {
        Self {
            repo,
            commit_id,
            base_path,
        }
    }

    /// Diff `old` (or nothing) against `new` (or nothing).
    pub fn index_tree(
        &self,
        ops: &mut dyn IndexOps,
        old: Option<&Oid>,
        new: Option<&Oid>,
        filter: &PathFilter,
    ) -> DiffResult<()> {
        self.walk(ops, old, new, filter, &mut Vec::new())
    }

    fn load(&self, id: Option<&Oid>) -> DiffResult<Tree> {
        match id {
            Some(id) => Ok(self.repo.read_tree(id)?),
            None => Ok(Tree::empty()),
        }
    }

    fn walk(
        &self,
        ops: &mut dyn IndexOps,
        old: Option<&Oid>,
        new: Option<&Oid>,
        filter: &PathFilter,
        path: &mut Vec<String>,
    ) -> DiffResult<()> {
        if old.is_some() && old == new {
            return Ok(());
        }
        let old_tree = self.load(old)?;
        let new_tree = self.load(new)?;

        for entry in new_tree.entries.iter().filter(|e| filter.allows(&e.name)) {
            path.push(entry.name.clone());
            self.index_entry(ops, old_tree.get(&entry.name), entry, filter, path)?;
            path.pop();
        }
        for entry in old_tree.entries.iter().filter(|e| filter.allows(&e.name)) {
            if new_tree.get(&entry.name).is_none() {
                path.push(entry.name.clone());
                self.delete_entry(ops, entry, filter, path)?;
                path.pop();
            }
        }
        Ok(())
    }

    fn index_entry(
        &self,
        ops: &mut dyn IndexOps,
        old: Option<&TreeEntry>,
        new: &TreeEntry,
        filter: &PathFilter,
        path: &mut Vec<String>,
    ) -> DiffResult<()> {
        let same_kind = |e: &&TreeEntry| e.mode.is_tree() == new.mode.is_tree();
        if old.is_some_and(|o| o.oid == new.oid && same_kind(&o)) {
            return Ok(());
        }
        // A file replaced by a directory (or the reverse) leaves stale records.
        if let Some(stale) = old.filter(|o| !same_kind(o)) {
            self.delete_entry(ops, stale, filter, path)?;
        }
        let old = old.filter(same_kind);

        if new.mode.is_tree() {
            return self.walk(ops, old.map(|o| &o.oid), Some(&new.oid), &filter.descend(), path);
        }
        if new.mode == EntryMode::Submodule || !is_json(&new.name) {
            return Ok(());
        }
        let (doc_type, id) = identify(self.relative(path));
        let Some(doc) = self.entry_to_doc(&doc_type, &id, new, path)? else {
            return Ok(());
        };
        ops.save(&doc_type, &id, index_document(&doc_type, &id, doc))
    }

    fn delete_entry(
        &self,
        ops: &mut dyn IndexOps,
        old: &TreeEntry,
        filter: &PathFilter,
        path: &mut Vec<String>,
    ) -> DiffResult<()> {
        if old.mode.is_tree() {
            return self.walk(ops, Some(&old.oid), None, &filter.descend(), path);
        }
        let (doc_type, id) = identify(self.relative(path));
        ops.delete(&doc_type, &id)
    }

    fn relative<'p>(&self, path: &'p [String]) -> &'p [String] {
        path.strip_prefix(self.base_path).unwrap_or(path)
    }

    fn entry_to_doc(&self, doc_type: &str, id: &str, entry: &TreeEntry, path: &[String]) -> DiffResult<Option<Value>> {
        let bytes = self.repo.read_blob(&entry.oid)?;
        let doc = match serde_json::from_slice::<Value>(&bytes) {
            Ok(doc @ Value::Object(_)) => doc,
            Ok(_) => {
                warn!(path = %path.join("/"), "ignoring record that is not a json object");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %path.join("/"), error = %e, "ignoring record with invalid json");
                return Ok(None);
            }
        };
        Ok(Some(stamp(doc, doc_type, id, &self.commit_id, &entry.oid)))
    }
}

/// Stamp a stored document with its identity and version metadata.
///
/// `meta.version` is the commit id (changes on every commit) and `meta.hash`
/// is the blob id (returns to its old value when an edit is undone).
/// Internal records carry both under `data.meta` and keep their own type and
/// id.
pub fn stamp(mut doc: Value, doc_type: &str, id: &str, version: &Oid, hash: &Oid) -> Value {
    let version = Value::String(version.to_hex());
    let hash = Value::String(hash.to_hex());
    if is_internal_card(doc_type, id) {
        set_path(&mut doc, &["data", "meta", "version"], version);
        set_path(&mut doc, &["data", "meta", "hash"], hash);
    } else {
        set_path(&mut doc, &["type"], Value::String(doc_type.to_string()));
        set_path(&mut doc, &["id"], Value::String(id.to_string()));
        set_path(&mut doc, &["meta", "version"], version);
        set_path(&mut doc, &["meta", "hash"], hash);
    }
    doc
}

/// The shape a stamped document is indexed in: internal records as is,
/// everything else wrapped as `{ "data": doc }`.
pub fn index_document(doc_type: &str, id: &str, doc: Value) -> Value {
    if is_internal_card(doc_type, id) {
        doc
    } else {
        json!({ "data": doc })
    }
}
