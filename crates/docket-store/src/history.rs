//! Commit-graph queries: reachability and merge bases.

use std::collections::{HashSet, VecDeque};

use docket_types::Oid;

use crate::error::{StoreError, StoreResult};
use crate::object::Commit;
use crate::traits::ObjectStore;

pub(crate) fn load_commit(store: &dyn ObjectStore, id: &Oid) -> StoreResult<Commit> {
    let obj = store.read(id)?.ok_or(StoreError::ObjectNotFound(*id))?;
    Commit::from_stored_object(obj)
}

/// All commits reachable from `start`, including `start` itself.
pub fn ancestors(store: &dyn ObjectStore, start: &Oid) -> StoreResult<HashSet<Oid>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([*start]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let commit = load_commit(store, &id)?;
        queue.extend(commit.parents.iter().filter(|p| !seen.contains(*p)));
    }
    Ok(seen)
}

/// True when `ancestor` is reachable from `descendant` (a commit is its own ancestor).
pub fn is_ancestor(store: &dyn ObjectStore, ancestor: &Oid, descendant: &Oid) -> StoreResult<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([*descendant]);
    while let Some(id) = queue.pop_front() {
        if id == *ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            continue;
        }
        queue.extend(load_commit(store, &id)?.parents);
    }
    Ok(false)
}

/// Best common ancestor of two commits.
///
/// Candidates are the common ancestors that are not themselves ancestors of
/// another common ancestor. With several candidates (criss-cross history) the
/// one with the latest committer time wins. Returns `None` for unrelated
/// histories.
pub fn merge_base(store: &dyn ObjectStore, a: &Oid, b: &Oid) -> StoreResult<Option<Oid>> {
    if a == b {
        return Ok(Some(*a));
    }
    let from_a = ancestors(store, a)?;
    if from_a.contains(b) {
        return Ok(Some(*b));
    }
    let from_b = ancestors(store, b)?;
    if from_b.contains(a) {
        return Ok(Some(*a));
    }

    let common: HashSet<Oid> = from_a.intersection(&from_b).copied().collect();
    if common.is_empty() {
        return Ok(None);
    }

    // Anything strictly behind a common ancestor is not a best candidate.
    let mut dominated = HashSet::new();
    for id in &common {
        for parent in load_commit(store, id)?.parents {
            if !dominated.contains(&parent) {
                dominated.extend(ancestors(store, &parent)?);
            }
        }
    }

    let mut best: Option<(Oid, Commit)> = None;
    for id in common.difference(&dominated) {
        let commit = load_commit(store, id)?;
        let better = match &best {
            None => true,
            Some((best_id, best_commit)) => {
                (commit.committer.when, *id.as_bytes()) > (best_commit.committer.when, *best_id.as_bytes())
            }
        };
        if better {
            best = Some((*id, commit));
        }
    }
    Ok(best.map(|(id, _)| id))
}
