//! Storage module for the on-disk result cache
//!
//! This module handles durable persistence of crawl results, including:
//! - Per-repository search outcome records
//! - Downloaded file content
//! - Rename-redirect markers
//! - Enumeration of every repository ever recorded
//!
//! The backend is abstracted behind the [`ResultStore`] trait so the
//! driver and reporter never depend on the concrete layout.

mod fs;
mod traits;

pub use fs::FsStore;
pub use traits::{ResultStore, StorageError, StorageResult};

use crate::repo::RepoRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One matched file within a repository, as reported by the search API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Repository-relative path of the matched file
    pub path: String,
}

impl SearchHit {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// The resolved state of a crawl attempt for one repository.
///
/// Renames are not an outcome: they are stored as separate marker records
/// (see [`ResultStore::record_rename`]) so a rename chain and a terminal
/// outcome can coexist for the same repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepoOutcome {
    /// The search completed; the hit list may be empty.
    Found { hits: Vec<SearchHit> },

    /// The repository no longer exists or is inaccessible.
    ///
    /// `degraded` marks an outcome produced by exhausting retries rather
    /// than an authoritative not-found signal, so re-crawl tooling can
    /// tell the two apart.
    NotFound { degraded: bool },
}

impl RepoOutcome {
    /// Returns the hit list for a completed search, if any.
    pub fn hits(&self) -> Option<&[SearchHit]> {
        match self {
            Self::Found { hits } => Some(hits),
            Self::NotFound { .. } => None,
        }
    }
}

/// On-disk form of an outcome, with identity and a timestamp.
///
/// The owner/name fields preserve display casing; the directory the record
/// lives in is derived from the lowercased key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub owner: String,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RepoOutcome,
}

impl OutcomeRecord {
    pub fn new(repo: &RepoRef, outcome: RepoOutcome) -> Self {
        Self {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            recorded_at: Utc::now(),
            outcome,
        }
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(self.owner.clone(), self.name.clone())
    }
}

/// On-disk form of a rename marker: this repository has moved to `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRecord {
    pub owner: String,
    pub name: String,
    pub target: RepoRef,
    pub recorded_at: DateTime<Utc>,
}

impl RenameRecord {
    pub fn new(from: &RepoRef, target: &RepoRef) -> Self {
        Self {
            owner: from.owner.clone(),
            name: from.name.clone(),
            target: target.clone(),
            recorded_at: Utc::now(),
        }
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(self.owner.clone(), self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_roundtrip() {
        let outcome = RepoOutcome::Found {
            hits: vec![SearchHit::new("project.json"), SearchHit::new("src/project.json")],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: RepoOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, parsed);
    }

    #[test]
    fn test_outcome_status_tag() {
        let json = serde_json::to_string(&RepoOutcome::NotFound { degraded: true }).unwrap();
        assert!(json.contains("\"status\":\"not_found\""));
        assert!(json.contains("\"degraded\":true"));
    }

    #[test]
    fn test_hits_accessor() {
        let found = RepoOutcome::Found {
            hits: vec![SearchHit::new("project.json")],
        };
        assert_eq!(found.hits().unwrap().len(), 1);
        assert!(RepoOutcome::NotFound { degraded: false }.hits().is_none());
    }

    #[test]
    fn test_record_preserves_display_casing() {
        let repo = RepoRef::new("Acme", "Widgets");
        let record = OutcomeRecord::new(&repo, RepoOutcome::NotFound { degraded: false });
        assert_eq!(record.owner, "Acme");
        assert_eq!(record.repo(), repo);
    }
}
