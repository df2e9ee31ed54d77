//! Storage traits and error types
//!
//! This module defines the trait interface for result cache backends and
//! associated error types.

use crate::repo::RepoRef;
use crate::storage::RepoOutcome;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Storage failures are fatal to the operation being attempted and are
/// surfaced to the caller; the driver decides whether to abort the crawl.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Result path escapes the repository tree: {0}")]
    InvalidResultPath(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for result cache backends
///
/// Every repository maps deterministically to a storage location, so no
/// central index has to be loaded: existence checks stay cheap even with
/// tens of thousands of cached repositories. All writes are atomic with
/// respect to process crash; a crash mid-write must never leave a record
/// that a subsequent existence check reports as present.
pub trait ResultStore: Send + Sync {
    // ===== Outcomes =====

    /// Checks whether an outcome has been recorded for a repository.
    ///
    /// Must not read record contents; the driver calls this for every
    /// candidate on every resumed run.
    fn has_outcome(&self, repo: &RepoRef) -> StorageResult<bool>;

    /// Reads the recorded outcome for a repository, if any.
    fn get_outcome(&self, repo: &RepoRef) -> StorageResult<Option<RepoOutcome>>;

    /// Records an outcome, overwriting any previous record.
    fn put_outcome(&self, repo: &RepoRef, outcome: &RepoOutcome) -> StorageResult<()>;

    // ===== Downloaded files =====

    /// Checks whether a search hit's content has been downloaded.
    fn has_file(&self, repo: &RepoRef, path: &str) -> StorageResult<bool>;

    /// Reads a downloaded file's content, if present.
    fn get_file_content(&self, repo: &RepoRef, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores a downloaded file's content.
    fn put_file_content(&self, repo: &RepoRef, path: &str, content: &[u8]) -> StorageResult<()>;

    // ===== Renames =====

    /// Records that `from` has been renamed to `target`.
    fn record_rename(&self, from: &RepoRef, target: &RepoRef) -> StorageResult<()>;

    /// Resolves one rename hop for a repository.
    ///
    /// Chain-following and cycle detection are the driver's responsibility.
    fn resolve_rename(&self, repo: &RepoRef) -> StorageResult<Option<RepoRef>>;

    // ===== Enumeration =====

    /// Enumerates every repository ever recorded (outcome or rename
    /// marker). Each call re-scans the backing store.
    fn list_known_repos(&self) -> StorageResult<Vec<RepoRef>>;
}
