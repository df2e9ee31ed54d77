//! Filesystem-backed result cache
//!
//! Each repository gets one directory under the storage root, derived from
//! the lowercased `(owner, name)` key:
//!
//! ```text
//! <root>/<owner>/<name>/outcome.json    search outcome record
//! <root>/<owner>/<name>/renamed.json    rename marker (if applicable)
//! <root>/<owner>/<name>/files/<path>    downloaded file tree
//! ```
//!
//! All record and file writes go through write-to-temp-then-rename so a
//! crash never publishes a half-written entry.

use crate::repo::RepoRef;
use crate::storage::{OutcomeRecord, RenameRecord, RepoOutcome, ResultStore, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const OUTCOME_FILE: &str = "outcome.json";
const RENAME_FILE: &str = "renamed.json";
const FILES_DIR: &str = "files";

/// Monotonic suffix so concurrent writers in one process never share a
/// temp file.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed [`ResultStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The root is created on first write; constructing the store does not
    /// touch the disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_dir(&self, repo: &RepoRef) -> PathBuf {
        let (owner, name) = repo.storage_key();
        self.root.join(owner).join(name)
    }

    fn outcome_path(&self, repo: &RepoRef) -> PathBuf {
        self.repo_dir(repo).join(OUTCOME_FILE)
    }

    fn rename_path(&self, repo: &RepoRef) -> PathBuf {
        self.repo_dir(repo).join(RENAME_FILE)
    }

    /// Maps a repository-relative result path into the mirrored file tree,
    /// rejecting anything that would escape the repository directory.
    fn file_path(&self, repo: &RepoRef, path: &str) -> StorageResult<PathBuf> {
        let mut full = self.repo_dir(repo).join(FILES_DIR);
        let mut any = false;
        for component in path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(StorageError::InvalidResultPath(path.to_string()));
            }
            full.push(component);
            any = true;
        }
        if !any {
            return Err(StorageError::InvalidResultPath(path.to_string()));
        }
        Ok(full)
    }

    /// Atomically publishes `content` at `path`: the bytes land in a temp
    /// file in the same directory, then a rename makes them visible.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> StorageResult<()> {
        let dir = path.parent().expect("storage paths always have a parent");
        fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .expect("storage paths always have a file name")
            .to_string_lossy();
        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&temp, content).map_err(|source| StorageError::Io {
            path: temp.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }

        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> StorageResult<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let record = serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(record))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, record: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_atomic(path, &bytes)
    }

    fn exists(path: &Path) -> StorageResult<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Recovers the display-cased identity of one cached repository
    /// directory from whichever record it contains.
    fn identity_from_dir(&self, dir: &Path) -> StorageResult<Option<RepoRef>> {
        if let Some(record) = self.read_json::<OutcomeRecord>(&dir.join(OUTCOME_FILE))? {
            return Ok(Some(record.repo()));
        }
        if let Some(record) = self.read_json::<RenameRecord>(&dir.join(RENAME_FILE))? {
            return Ok(Some(record.repo()));
        }
        Ok(None)
    }
}

impl ResultStore for FsStore {
    fn has_outcome(&self, repo: &RepoRef) -> StorageResult<bool> {
        Self::exists(&self.outcome_path(repo))
    }

    fn get_outcome(&self, repo: &RepoRef) -> StorageResult<Option<RepoOutcome>> {
        let record: Option<OutcomeRecord> = self.read_json(&self.outcome_path(repo))?;
        Ok(record.map(|r| r.outcome))
    }

    fn put_outcome(&self, repo: &RepoRef, outcome: &RepoOutcome) -> StorageResult<()> {
        let record = OutcomeRecord::new(repo, outcome.clone());
        self.write_json(&self.outcome_path(repo), &record)
    }

    fn has_file(&self, repo: &RepoRef, path: &str) -> StorageResult<bool> {
        Self::exists(&self.file_path(repo, path)?)
    }

    fn get_file_content(&self, repo: &RepoRef, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = self.file_path(repo, path)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path: full, source }),
        }
    }

    fn put_file_content(&self, repo: &RepoRef, path: &str, content: &[u8]) -> StorageResult<()> {
        let full = self.file_path(repo, path)?;
        self.write_atomic(&full, content)
    }

    fn record_rename(&self, from: &RepoRef, target: &RepoRef) -> StorageResult<()> {
        let record = RenameRecord::new(from, target);
        self.write_json(&self.rename_path(from), &record)
    }

    fn resolve_rename(&self, repo: &RepoRef) -> StorageResult<Option<RepoRef>> {
        let record: Option<RenameRecord> = self.read_json(&self.rename_path(repo))?;
        Ok(record.map(|r| r.target))
    }

    fn list_known_repos(&self) -> StorageResult<Vec<RepoRef>> {
        let mut repos = Vec::new();

        let owners = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(repos),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        for owner_entry in owners {
            let owner_entry = owner_entry.map_err(|source| StorageError::Io {
                path: self.root.clone(),
                source,
            })?;
            let owner_path = owner_entry.path();
            if !owner_path.is_dir() {
                continue;
            }

            let names = fs::read_dir(&owner_path).map_err(|source| StorageError::Io {
                path: owner_path.clone(),
                source,
            })?;
            for name_entry in names {
                let name_entry = name_entry.map_err(|source| StorageError::Io {
                    path: owner_path.clone(),
                    source,
                })?;
                let repo_path = name_entry.path();
                if !repo_path.is_dir() {
                    continue;
                }

                if let Some(repo) = self.identity_from_dir(&repo_path)? {
                    repos.push(repo);
                }
            }
        }

        repos.sort_by(|a, b| a.storage_key().cmp(&b.storage_key()));
        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SearchHit;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_outcome_roundtrip() {
        let (_dir, store) = store();
        let repo = RepoRef::new("acme", "widgets");
        let outcome = RepoOutcome::Found {
            hits: vec![SearchHit::new("project.json")],
        };

        assert!(!store.has_outcome(&repo).unwrap());
        store.put_outcome(&repo, &outcome).unwrap();
        assert!(store.has_outcome(&repo).unwrap());
        assert_eq!(store.get_outcome(&repo).unwrap(), Some(outcome));
    }

    #[test]
    fn test_outcome_overwrite() {
        let (_dir, store) = store();
        let repo = RepoRef::new("acme", "widgets");

        store
            .put_outcome(&repo, &RepoOutcome::NotFound { degraded: true })
            .unwrap();
        store
            .put_outcome(&repo, &RepoOutcome::Found { hits: vec![] })
            .unwrap();

        assert_eq!(
            store.get_outcome(&repo).unwrap(),
            Some(RepoOutcome::Found { hits: vec![] })
        );
    }

    #[test]
    fn test_case_insensitive_keying() {
        let (_dir, store) = store();
        store
            .put_outcome(
                &RepoRef::new("Acme", "Widgets"),
                &RepoOutcome::Found { hits: vec![] },
            )
            .unwrap();

        assert!(store.has_outcome(&RepoRef::new("acme", "widgets")).unwrap());
    }

    #[test]
    fn test_file_content_nested_path() {
        let (_dir, store) = store();
        let repo = RepoRef::new("acme", "widgets");
        let content = b"{\"dependencies\":{}}";

        assert!(!store.has_file(&repo, "src/app/project.json").unwrap());
        store
            .put_file_content(&repo, "src/app/project.json", content)
            .unwrap();
        assert!(store.has_file(&repo, "src/app/project.json").unwrap());
        assert_eq!(
            store
                .get_file_content(&repo, "src/app/project.json")
                .unwrap()
                .unwrap(),
            content
        );
    }

    #[test]
    fn test_result_path_escape_rejected() {
        let (_dir, store) = store();
        let repo = RepoRef::new("acme", "widgets");

        for path in ["../outside", "a/../../b", "", "/absolute", "a//b"] {
            let err = store.put_file_content(&repo, path, b"x").unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidResultPath(_)),
                "expected rejection for {:?}",
                path
            );
        }
    }

    #[test]
    fn test_rename_roundtrip() {
        let (_dir, store) = store();
        let old = RepoRef::new("acme", "widgets-old");
        let new = RepoRef::new("acme", "widgets");

        assert!(store.resolve_rename(&old).unwrap().is_none());
        store.record_rename(&old, &new).unwrap();
        assert_eq!(store.resolve_rename(&old).unwrap(), Some(new));
    }

    #[test]
    fn test_unpublished_temp_is_invisible() {
        let (dir, store) = store();
        let repo = RepoRef::new("acme", "widgets");

        // Simulate a crash between temp-write and rename: only the temp
        // file exists.
        let repo_dir = dir.path().join("acme").join("widgets");
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join(".outcome.json.1234.0.tmp"), b"{garbage").unwrap();

        assert!(!store.has_outcome(&repo).unwrap());
        assert!(store.get_outcome(&repo).unwrap().is_none());
    }

    #[test]
    fn test_list_known_repos() {
        let (_dir, store) = store();
        let found = RepoRef::new("Acme", "Widgets");
        let renamed = RepoRef::new("acme", "widgets-old");

        store
            .put_outcome(&found, &RepoOutcome::Found { hits: vec![] })
            .unwrap();
        store.record_rename(&renamed, &found).unwrap();

        let known = store.list_known_repos().unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains(&found));
        assert!(known.contains(&renamed));

        // Display casing is recovered from the records, not the directory
        // names.
        let listed = known.iter().find(|r| *r == &found).unwrap();
        assert_eq!(listed.owner, "Acme");
    }

    #[test]
    fn test_list_known_repos_empty_root() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path().join("does-not-exist-yet"));
        assert!(store.list_known_repos().unwrap().is_empty());
    }
}
