//! Repository identity and candidate list handling
//!
//! This module defines the `(owner, name)` identity used to key every cache
//! and crawl operation, plus the parser for the newline-delimited candidate
//! list file.

mod list;

pub use list::load_candidate_list;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a repository by owner and name.
///
/// Hosting platforms resolve repository names case-insensitively but
/// preserve the original casing for display, so equality and hashing here
/// ignore ASCII case while the fields keep whatever casing they were
/// created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Creates a new repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses an `owner/name` string.
    ///
    /// # Returns
    ///
    /// * `Some(RepoRef)` - The string had exactly one `/` with non-empty
    ///   halves on both sides
    /// * `None` - Malformed input
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (owner, name) = s.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    /// Returns the lowercased `(owner, name)` pair used to derive storage
    /// locations.
    pub fn storage_key(&self) -> (String, String) {
        (
            self.owner.to_ascii_lowercase(),
            self.name.to_ascii_lowercase(),
        )
    }
}

impl PartialEq for RepoRef {
    fn eq(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for RepoRef {}

impl Hash for RepoRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.owner.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(b'/');
        for b in self.name.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_valid() {
        let r = RepoRef::parse("acme/widgets").unwrap();
        assert_eq!(r.owner, "acme");
        assert_eq!(r.name, "widgets");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let r = RepoRef::parse("  acme/widgets \n").unwrap();
        assert_eq!(r.owner, "acme");
        assert_eq!(r.name, "widgets");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(RepoRef::parse("no-slash").is_none());
        assert!(RepoRef::parse("/name").is_none());
        assert!(RepoRef::parse("owner/").is_none());
        assert!(RepoRef::parse("a/b/c").is_none());
        assert!(RepoRef::parse("").is_none());
    }

    #[test]
    fn test_equality_ignores_case() {
        let a = RepoRef::new("Acme", "Widgets");
        let b = RepoRef::new("acme", "widgets");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_display_preserves_case() {
        let r = RepoRef::new("Acme", "Widgets");
        assert_eq!(r.to_string(), "Acme/Widgets");
    }

    #[test]
    fn test_storage_key_lowercases() {
        let r = RepoRef::new("Acme", "Widgets");
        assert_eq!(
            r.storage_key(),
            ("acme".to_string(), "widgets".to_string())
        );
    }
}
