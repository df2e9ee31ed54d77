//! Statistics generation from the result cache
//!
//! This module provides functionality for extracting and displaying crawl
//! progress from the storage layer without touching the network.

use crate::repo::RepoRef;
use crate::report::{known_universe, resolve_outcome};
use crate::storage::{RepoOutcome, ResultStore};
use crate::SiftError;
use std::collections::{HashMap, HashSet};

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Repositories in the candidate list plus discovered rename targets
    pub total_repos: usize,

    /// Repositories resolved to a completed search
    pub repos_searched: usize,

    /// Repositories resolved as not found
    pub not_found_repos: usize,

    /// Of the not-found repositories, how many were recorded after retry
    /// exhaustion rather than an authoritative signal
    pub degraded_repos: usize,

    /// Repositories with no outcome yet
    pub remaining_repos: usize,

    /// Search hits across all completed searches
    pub total_hits: usize,

    /// Hits whose content is already in the file cache
    pub downloaded_files: usize,

    /// Hits still waiting for the download pass
    pub remaining_files: usize,

    /// Search hits per owner (display casing of the resolved repository)
    pub owner_hit_counts: HashMap<String, usize>,
}

/// Loads statistics from the result cache.
///
/// # Arguments
///
/// * `store` - The result cache to scan
/// * `candidates` - The candidate repository list
pub fn load_statistics(
    store: &dyn ResultStore,
    candidates: &[RepoRef],
) -> Result<CrawlStatistics, SiftError> {
    let mut stats = CrawlStatistics::default();
    let mut seen_final: HashSet<RepoRef> = HashSet::new();

    for repo in known_universe(store, candidates)? {
        stats.total_repos += 1;

        match resolve_outcome(store, &repo)? {
            Some((final_ref, RepoOutcome::Found { hits })) => {
                stats.repos_searched += 1;

                // A rename chain and its target are one repository; count
                // its hits once.
                if !seen_final.insert(final_ref.clone()) {
                    continue;
                }

                for hit in &hits {
                    stats.total_hits += 1;
                    *stats
                        .owner_hit_counts
                        .entry(final_ref.owner.clone())
                        .or_insert(0) += 1;

                    if store.has_file(&final_ref, &hit.path)? {
                        stats.downloaded_files += 1;
                    } else {
                        stats.remaining_files += 1;
                    }
                }
            }

            Some((_, RepoOutcome::NotFound { degraded })) => {
                stats.not_found_repos += 1;
                if degraded {
                    stats.degraded_repos += 1;
                }
            }

            None => stats.remaining_repos += 1,
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner.
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Total repos:        {}", stats.total_repos);
    println!("Repos searched:     {}", stats.repos_searched);
    println!(
        "Not found repos:    {} ({} degraded)",
        stats.not_found_repos, stats.degraded_repos
    );
    println!("Remaining repos:    {}", stats.remaining_repos);
    println!("Total results:      {}", stats.total_hits);
    println!("Results downloaded: {}", stats.downloaded_files);
    println!("Remaining files:    {}", stats.remaining_files);

    if !stats.owner_hit_counts.is_empty() {
        println!("\nTop owners by results:");
        let mut owners: Vec<_> = stats.owner_hit_counts.iter().collect();
        owners.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (owner, count) in owners.into_iter().take(20) {
            println!("  {}\t{}", owner, count);
        }
    }

    if stats.total_repos > 0 {
        let done = stats.repos_searched + stats.not_found_repos;
        let percentage = (done as f64 / stats.total_repos as f64) * 100.0;
        println!(
            "\nCrawl progress: {:.1}% ({} / {} repositories resolved)",
            percentage, done, stats.total_repos
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsStore, SearchHit};
    use tempfile::TempDir;

    #[test]
    fn test_statistics_over_mixed_cache() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        let found = RepoRef::new("acme", "widgets");
        let gone = RepoRef::new("acme", "gone");
        let pending = RepoRef::new("acme", "pending");

        store
            .put_outcome(
                &found,
                &RepoOutcome::Found {
                    hits: vec![SearchHit::new("project.json"), SearchHit::new("sub/project.json")],
                },
            )
            .unwrap();
        store
            .put_outcome(&gone, &RepoOutcome::NotFound { degraded: true })
            .unwrap();
        store
            .put_file_content(&found, "project.json", b"{}")
            .unwrap();

        let candidates = vec![found.clone(), gone.clone(), pending.clone()];
        let stats = load_statistics(&store, &candidates).unwrap();

        assert_eq!(stats.total_repos, 3);
        assert_eq!(stats.repos_searched, 1);
        assert_eq!(stats.not_found_repos, 1);
        assert_eq!(stats.degraded_repos, 1);
        assert_eq!(stats.remaining_repos, 1);
        assert_eq!(stats.total_hits, 2);
        assert_eq!(stats.downloaded_files, 1);
        assert_eq!(stats.remaining_files, 1);
        assert_eq!(stats.owner_hit_counts.get("acme"), Some(&2));
    }

    #[test]
    fn test_renamed_entries_share_hits() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        let old = RepoRef::new("acme", "widgets-old");
        let new = RepoRef::new("acme", "widgets");

        store.record_rename(&old, &new).unwrap();
        store
            .put_outcome(
                &new,
                &RepoOutcome::Found {
                    hits: vec![SearchHit::new("project.json")],
                },
            )
            .unwrap();

        let stats = load_statistics(&store, &[old, new]).unwrap();

        // Both list entries resolve to the same completed search, but the
        // hit is only counted once.
        assert_eq!(stats.total_repos, 2);
        assert_eq!(stats.repos_searched, 2);
        assert_eq!(stats.total_hits, 1);
    }
}
