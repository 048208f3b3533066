//! File-backed reference store.
//!
//! A ref named `refs/heads/master` lives at `<gitdir>/refs/heads/master` and
//! contains the hex id of its target followed by a newline.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use docket_types::Oid;

use crate::error::{StoreError, StoreResult};
use crate::names::validate_ref_name;
use crate::traits::RefStore;

/// Filesystem [`RefStore`] rooted at a git directory.
#[derive(Debug)]
pub struct FsRefStore {
    gitdir: PathBuf,
}

impl FsRefStore {
    pub fn new(gitdir: impl Into<PathBuf>) -> Self {
        Self {
            gitdir: gitdir.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.gitdir.join(name)
    }

    fn refs_root(&self) -> PathBuf {
        self.gitdir.join("refs")
    }

    /// Update `name` to `target` while holding `<ref>.lock`.
    ///
    /// `check` sees the current value under the lock and can veto the update.
    /// Concurrent updaters (in this or another process) fail with
    /// [`StoreError::RefLocked`] instead of waiting.
    pub fn update_locked<F>(&self, name: &str, target: &Oid, check: F) -> StoreResult<()>
    where
        F: FnOnce(Option<Oid>) -> StoreResult<()>,
    {
        validate_ref_name(name)?;
        let path = self.path_for(name);
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(std::io::Error::other("ref path has no parent")))?;
        fs::create_dir_all(dir)?;

        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        let lock = RefLock::acquire(name, PathBuf::from(lock_path))?;
        let current = self.read_ref(name)?;
        check(current)?;
        lock.commit(target, &path)
    }

    /// Replace `name` only if it currently points at `expected` (`None` = absent).
    pub fn compare_and_swap(&self, name: &str, expected: Option<Oid>, target: &Oid) -> StoreResult<()> {
        self.update_locked(name, target, |actual| {
            if actual != expected {
                return Err(StoreError::RefConflict {
                    name: name.to_string(),
                    expected,
                    actual,
                });
            }
            Ok(())
        })
    }
}

/// Exclusive `<ref>.lock` file, removed on drop unless committed.
struct RefLock {
    path: PathBuf,
    file: Option<fs::File>,
    committed: bool,
}

impl RefLock {
    fn acquire(name: &str, path: PathBuf) -> StoreResult<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => Ok(Self {
                path,
                file: Some(file),
                committed: false,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::RefLocked(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn commit(mut self, target: &Oid, dest: &Path) -> StoreResult<()> {
        if let Some(mut file) = self.file.take() {
            writeln!(file, "{}", target.to_hex())?;
            file.sync_all()?;
        }
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn relative_name(gitdir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(gitdir).ok()?;
    let parts: Vec<&str> = rel.iter().map(|p| p.to_str()).collect::<Option<_>>()?;
    Some(parts.join("/"))
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> StoreResult<Option<Oid>> {
        validate_ref_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let oid = Oid::from_hex(&text).map_err(|e| StoreError::Serialization(format!("ref {name}: {e}")))?;
        Ok(Some(oid))
    }

    fn write_ref(&self, name: &str, target: &Oid) -> StoreResult<()> {
        validate_ref_name(name)?;
        let path = self.path_for(name);
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(std::io::Error::other("ref path has no parent")))?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{}", target.to_hex())?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        validate_ref_name(name)?;
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, Oid)>> {
        let root = self.refs_root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut refs = Vec::new();
        for entry in walkdir::WalkDir::new(&root) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = relative_name(&self.gitdir, entry.path()) else {
                continue;
            };
            // Skip stray files (e.g. temporaries) that are not valid refs.
            if !name.starts_with(prefix) || validate_ref_name(&name).is_err() {
                continue;
            }
            if let Some(target) = self.read_ref(&name)? {
                refs.push((name, target));
            }
        }
        refs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_refs() -> (tempfile::TempDir, FsRefStore) {
        let dir = tempfile::tempdir().unwrap();
        let refs = FsRefStore::new(dir.path());
        (dir, refs)
    }

    #[test]
    fn write_and_read_branch() {
        let (_dir, refs) = temp_refs();
        let target = Oid::from_bytes(b"commit");
        refs.write_ref("refs/heads/master", &target).unwrap();
        assert_eq!(refs.read_ref("refs/heads/master").unwrap(), Some(target));
    }

    #[test]
    fn missing_ref_reads_none() {
        let (_dir, refs) = temp_refs();
        assert_eq!(refs.read_ref("refs/heads/nope").unwrap(), None);
    }

    #[test]
    fn overwrite_and_delete() {
        let (_dir, refs) = temp_refs();
        refs.write_ref("refs/heads/master", &Oid::from_bytes(b"1")).unwrap();
        refs.write_ref("refs/heads/master", &Oid::from_bytes(b"2")).unwrap();
        assert_eq!(refs.read_ref("refs/heads/master").unwrap(), Some(Oid::from_bytes(b"2")));
        assert!(refs.delete_ref("refs/heads/master").unwrap());
        assert!(!refs.delete_ref("refs/heads/master").unwrap());
    }

    #[test]
    fn list_by_prefix() {
        let (_dir, refs) = temp_refs();
        refs.write_ref("refs/heads/master", &Oid::from_bytes(b"1")).unwrap();
        refs.write_ref("refs/heads/staging/master", &Oid::from_bytes(b"2")).unwrap();
        refs.write_ref("refs/remotes/origin/master", &Oid::from_bytes(b"3")).unwrap();

        let heads = refs.list_refs("refs/heads/").unwrap();
        let names: Vec<_> = heads.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["refs/heads/master", "refs/heads/staging/master"]);
        assert_eq!(refs.list_refs("").unwrap().len(), 3);
    }

    #[test]
    fn compare_and_swap_checks_current_value() {
        let (_dir, refs) = temp_refs();
        let one = Oid::from_bytes(b"1");
        let two = Oid::from_bytes(b"2");
        refs.compare_and_swap("refs/heads/master", None, &one).unwrap();

        let err = refs.compare_and_swap("refs/heads/master", None, &two).unwrap_err();
        assert!(matches!(err, StoreError::RefConflict { actual: Some(a), .. } if a == one));

        refs.compare_and_swap("refs/heads/master", Some(one), &two).unwrap();
        assert_eq!(refs.read_ref("refs/heads/master").unwrap(), Some(two));
    }

    #[test]
    fn held_lock_blocks_updates() {
        let (dir, refs) = temp_refs();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/master.lock"), "").unwrap();

        let err = refs
            .compare_and_swap("refs/heads/master", None, &Oid::from_bytes(b"1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::RefLocked(_)));
        // The foreign lock is left alone and is not listed as a ref.
        assert!(dir.path().join("refs/heads/master.lock").exists());
        assert!(refs.list_refs("").unwrap().is_empty());
    }

    #[test]
    fn vetoed_update_releases_lock() {
        let (dir, refs) = temp_refs();
        let err = refs
            .update_locked("refs/heads/master", &Oid::from_bytes(b"1"), |_| {
                Err(StoreError::NotFastForward("refs/heads/master".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFastForward(_)));
        assert!(!dir.path().join("refs/heads/master.lock").exists());
        assert_eq!(refs.read_ref("refs/heads/master").unwrap(), None);
    }

    #[test]
    fn rejects_invalid_names() {
        let (_dir, refs) = temp_refs();
        let err = refs.write_ref("refs/heads/bad..name", &Oid::from_bytes(b"1")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRefName { .. }));
    }
}
