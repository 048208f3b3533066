use std::collections::BTreeSet;

use docket_store::{Commit, Repository, Tree, TreeEntry};
use docket_types::{Oid, Signature};
use tracing::debug;

use crate::error::{MergeError, MergeResult};

fn load(repo: &Repository, id: Option<&Oid>) -> MergeResult<Tree> {
    match id {
        Some(id) => Ok(repo.read_tree(id)?),
        None => Ok(Tree::empty()),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Merge `ours` and `theirs` against their common `base` tree.
///
/// Per entry: identical sides win, a side equal to the base yields the other
/// side, and two subtrees merge recursively. Anything else is a
/// [`MergeError::Conflict`]. Returns the id of the written merged tree.
pub fn merge_trees(repo: &Repository, base: Option<&Oid>, ours: &Oid, theirs: &Oid) -> MergeResult<Oid> {
    if ours == theirs || base == Some(theirs) {
        return Ok(*ours);
    }
    if base == Some(ours) {
        return Ok(*theirs);
    }
    let merged = merge_level(repo, base, ours, theirs, "")?;
    Ok(repo.write_tree(&merged)?)
}

fn merge_level(repo: &Repository, base: Option<&Oid>, ours: &Oid, theirs: &Oid, prefix: &str) -> MergeResult<Tree> {
    let base = load(repo, base)?;
    let ours = load(repo, Some(ours))?;
    let theirs = load(repo, Some(theirs))?;

    let names: BTreeSet<&str> = base
        .entries
        .iter()
        .chain(&ours.entries)
        .chain(&theirs.entries)
        .map(|e| e.name.as_str())
        .collect();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let (b, o, t) = (base.get(name), ours.get(name), theirs.get(name));
        let picked = if o == t || b == t {
            o.cloned()
        } else if b == o {
            t.cloned()
        } else {
            let path = join(prefix, name);
            match (o, t) {
                (Some(o), Some(t)) if o.mode.is_tree() && t.mode.is_tree() => {
                    let base_sub = b.filter(|e| e.mode.is_tree()).map(|e| &e.oid);
                    let sub = merge_level(repo, base_sub, &o.oid, &t.oid, &path)?;
                    if sub.is_empty() {
                        None
                    } else {
                        Some(TreeEntry::new(o.mode, name, repo.write_tree(&sub)?))
                    }
                }
                _ => {
                    debug!(path = %path, "conflicting change");
                    return Err(MergeError::Conflict { path });
                }
            }
        };
        entries.extend(picked);
    }
    Ok(Tree::new(entries))
}

/// Create a merge commit of two commits with parents `[ours, theirs]`.
///
/// The merged tree is computed against the best common ancestor (an empty
/// tree for unrelated histories). Branches are not moved.
pub fn perform_merge(
    repo: &Repository,
    ours: &Oid,
    theirs: &Oid,
    author: &Signature,
    committer: &Signature,
    message: &str,
) -> MergeResult<Oid> {
    let our_commit = repo.read_commit(ours)?;
    let their_commit = repo.read_commit(theirs)?;
    let base_tree = match repo.merge_base(ours, theirs)? {
        Some(base) => Some(repo.read_commit(&base)?.tree),
        None => None,
    };
    let tree = merge_trees(repo, base_tree.as_ref(), &our_commit.tree, &their_commit.tree)?;
    let id = repo.create_commit(&Commit {
        tree,
        parents: vec![*ours, *theirs],
        author: author.clone(),
        committer: committer.clone(),
        message: message.to_string(),
    })?;
    debug!(ours = %ours.short_hex(), theirs = %theirs.short_hex(), merge = %id.short_hex(), "merge commit created");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_store::EntryMode;

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: Repository,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let repo = Repository::init_bare(dir.path()).unwrap();
            Self { _dir: dir, repo }
        }

        /// Build a tree from `(path, content)` pairs.
        fn tree(&self, files: &[(&str, &str)]) -> Oid {
            self.build(files, "")
        }

        fn build(&self, files: &[(&str, &str)], prefix: &str) -> Oid {
            let mut entries = Vec::new();
            let mut dirs = BTreeSet::new();
            for (path, content) in files {
                let Some(rest) = path.strip_prefix(prefix) else { continue };
                match rest.split_once('/') {
                    Some((dir, _)) => {
                        dirs.insert(dir.to_string());
                    }
                    None => {
                        let blob = self.repo.write_blob(content.as_bytes()).unwrap();
                        entries.push(TreeEntry::new(EntryMode::Blob, rest, blob));
                    }
                }
            }
            for dir in dirs {
                let sub = self.build(files, &format!("{prefix}{dir}/"));
                entries.push(TreeEntry::new(EntryMode::Tree, dir, sub));
            }
            self.repo.write_tree(&Tree::new(entries)).unwrap()
        }

        fn commit(&self, tree: Oid, parents: Vec<Oid>) -> Oid {
            let sig = Signature::now("Ada", "ada@example.com");
            self.repo
                .create_commit(&Commit {
                    tree,
                    parents,
                    author: sig.clone(),
                    committer: sig,
                    message: "change".into(),
                })
                .unwrap()
        }

        fn read(&self, tree: &Oid, path: &str) -> Option<Vec<u8>> {
            let mut current = *tree;
            let mut parts = path.split('/').peekable();
            while let Some(part) = parts.next() {
                let tree = self.repo.read_tree(&current).unwrap();
                let entry = tree.get(part)?;
                if parts.peek().is_none() {
                    return Some(self.repo.read_blob(&entry.oid).unwrap());
                }
                current = entry.oid;
            }
            None
        }
    }

    #[test]
    fn disjoint_additions_merge_cleanly() {
        let f = Fixture::new();
        let base = f.tree(&[("contents/a/1.json", "one")]);
        let ours = f.tree(&[("contents/a/1.json", "one"), ("contents/a/2.json", "two")]);
        let theirs = f.tree(&[("contents/a/1.json", "one"), ("contents/b/3.json", "three")]);

        let merged = merge_trees(&f.repo, Some(&base), &ours, &theirs).unwrap();
        assert_eq!(f.read(&merged, "contents/a/2.json").unwrap(), b"two");
        assert_eq!(f.read(&merged, "contents/b/3.json").unwrap(), b"three");
        assert_eq!(f.read(&merged, "contents/a/1.json").unwrap(), b"one");
    }

    #[test]
    fn one_sided_changes_win() {
        let f = Fixture::new();
        let base = f.tree(&[("a.json", "old"), ("b.json", "keep")]);
        let ours = f.tree(&[("a.json", "new"), ("b.json", "keep")]);
        let theirs = f.tree(&[("a.json", "old")]);

        let merged = merge_trees(&f.repo, Some(&base), &ours, &theirs).unwrap();
        assert_eq!(f.read(&merged, "a.json").unwrap(), b"new");
        assert_eq!(f.read(&merged, "b.json"), None);
    }

    #[test]
    fn identical_changes_are_not_conflicts() {
        let f = Fixture::new();
        let base = f.tree(&[("a.json", "old")]);
        let both = f.tree(&[("a.json", "new"), ("c.json", "x")]);
        let other = f.tree(&[("a.json", "new"), ("c.json", "x"), ("d.json", "y")]);
        let merged = merge_trees(&f.repo, Some(&base), &both, &other).unwrap();
        assert_eq!(merged, other);
    }

    #[test]
    fn conflicting_edits_report_path() {
        let f = Fixture::new();
        let base = f.tree(&[("cards/x.json", "0")]);
        let ours = f.tree(&[("cards/x.json", "1")]);
        let theirs = f.tree(&[("cards/x.json", "2")]);
        let err = merge_trees(&f.repo, Some(&base), &ours, &theirs).unwrap_err();
        assert!(matches!(err, MergeError::Conflict { ref path } if path == "cards/x.json"));
    }

    #[test]
    fn edit_versus_delete_conflicts() {
        let f = Fixture::new();
        let base = f.tree(&[("a.json", "0"), ("b.json", "b")]);
        let ours = f.tree(&[("a.json", "1"), ("b.json", "b")]);
        let theirs = f.tree(&[("b.json", "b")]);
        assert!(matches!(
            merge_trees(&f.repo, Some(&base), &ours, &theirs),
            Err(MergeError::Conflict { .. })
        ));
    }

    #[test]
    fn merge_commit_has_both_parents() {
        let f = Fixture::new();
        let root = f.commit(f.tree(&[("a.json", "a")]), vec![]);
        let left = f.commit(f.tree(&[("a.json", "a"), ("l.json", "l")]), vec![root]);
        let right = f.commit(f.tree(&[("a.json", "a"), ("r.json", "r")]), vec![root]);
        let sig = Signature::now("Ada", "ada@example.com");

        let merge = perform_merge(&f.repo, &left, &right, &sig, &sig, "Clean merge into master").unwrap();
        let commit = f.repo.read_commit(&merge).unwrap();
        assert_eq!(commit.parents, vec![left, right]);
        assert_eq!(commit.message, "Clean merge into master");
        assert_eq!(f.read(&commit.tree, "l.json").unwrap(), b"l");
        assert_eq!(f.read(&commit.tree, "r.json").unwrap(), b"r");
    }
}
