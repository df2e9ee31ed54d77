//! Candidate list file parsing
//!
//! The candidate list is a newline-delimited text file with one
//! `owner/name` entry per line. Malformed lines are skipped with a warning
//! rather than failing the whole run; duplicates are dropped keeping the
//! first occurrence.

use crate::repo::RepoRef;
use std::collections::HashSet;
use std::path::Path;

/// Loads the candidate repository list from a file.
///
/// # Arguments
///
/// * `path` - Path to the newline-delimited `owner/name` list
///
/// # Returns
///
/// * `Ok(Vec<RepoRef>)` - Parsed candidates in file order, de-duplicated
/// * `Err(std::io::Error)` - The file could not be read
pub fn load_candidate_list(path: &Path) -> std::io::Result<Vec<RepoRef>> {
    let content = std::fs::read_to_string(path)?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match RepoRef::parse(line) {
            Some(repo) => {
                if seen.insert(repo.clone()) {
                    candidates.push(repo);
                } else {
                    tracing::debug!("Duplicate candidate {} on line {}", repo, lineno + 1);
                }
            }
            None => {
                tracing::warn!(
                    "Skipping malformed candidate list line {}: {:?}",
                    lineno + 1,
                    line
                );
            }
        }
    }

    tracing::info!(
        "Loaded {} candidate repositories from {}",
        candidates.len(),
        path.display()
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_list(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_simple_list() {
        let file = write_list("acme/widgets\nacme/gadgets\n");
        let list = load_candidate_list(file.path()).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], RepoRef::new("acme", "widgets"));
        assert_eq!(list[1], RepoRef::new("acme", "gadgets"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let file = write_list("acme/widgets\nnot-a-repo\n/nope\nalso/\n\n");
        let list = load_candidate_list(file.path()).unwrap();
        assert_eq!(list, vec![RepoRef::new("acme", "widgets")]);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let file = write_list("Acme/Widgets\nacme/widgets\nacme/other\n");
        let list = load_candidate_list(file.path()).unwrap();
        assert_eq!(list.len(), 2);
        // First occurrence's casing wins
        assert_eq!(list[0].owner, "Acme");
    }

    #[test]
    fn test_missing_file() {
        let result = load_candidate_list(Path::new("/nonexistent/repos.txt"));
        assert!(result.is_err());
    }
}
