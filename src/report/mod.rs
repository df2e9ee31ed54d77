//! Analysis reporting from the result cache
//!
//! The reporter is a read-only consumer of the cache: it never touches the
//! network. It walks the candidate list unioned with every repository the
//! cache knows about, resolves rename chains the same way the driver does,
//! and emits two tab-separated report files:
//!
//! - a stats file with one row per downloaded manifest
//! - a properties file with one row per interesting property occurrence

mod manifest;
mod stats;

pub use manifest::{ManifestAnalysis, PropertyOccurrence, TRACKED_PROPERTIES};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::config::Config;
use crate::repo::{load_candidate_list, RepoRef};
use crate::storage::{RepoOutcome, ResultStore};
use crate::SiftError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Candidate list unioned with every repository the cache has recorded,
/// candidates first, order-stable.
fn known_universe(
    store: &dyn ResultStore,
    candidates: &[RepoRef],
) -> Result<Vec<RepoRef>, SiftError> {
    let mut seen: HashSet<RepoRef> = candidates.iter().cloned().collect();
    let mut universe: Vec<RepoRef> = candidates.to_vec();

    for repo in store.list_known_repos()? {
        if seen.insert(repo.clone()) {
            universe.push(repo);
        }
    }

    Ok(universe)
}

/// Follows cached rename markers from `repo` to the ref carrying an
/// outcome, mirroring the driver's resolution order. Returns `None` for
/// pending repositories and for marker chains that cycle without reaching
/// an outcome.
fn resolve_outcome(
    store: &dyn ResultStore,
    repo: &RepoRef,
) -> Result<Option<(RepoRef, RepoOutcome)>, SiftError> {
    let mut visited: HashSet<RepoRef> = HashSet::new();
    let mut current = repo.clone();

    loop {
        if !visited.insert(current.clone()) {
            return Ok(None);
        }
        if let Some(outcome) = store.get_outcome(&current)? {
            return Ok(Some((current, outcome)));
        }
        match store.resolve_rename(&current)? {
            Some(target) => current = target,
            None => return Ok(None),
        }
    }
}

/// Generates the TSV report files and returns the statistics gathered
/// along the way.
///
/// # Arguments
///
/// * `config` - The loaded configuration (report paths, flagged owners)
/// * `store` - The result cache to read
pub fn generate_report(
    config: &Config,
    store: &dyn ResultStore,
) -> Result<CrawlStatistics, SiftError> {
    let candidates = load_candidate_list(Path::new(&config.storage.repo_list))?;

    let mut stats_out = BufWriter::new(File::create(&config.report.stats_path)?);
    let mut props_out = BufWriter::new(File::create(&config.report.properties_path)?);

    writeln!(
        stats_out,
        "Owner\tRepo name\tPath\tFlagged owner\tFramework count\t\
         Top-level dependencies\tFramework-specific dependencies\t{}\tParsing error",
        TRACKED_PROPERTIES.join("\t")
    )?;
    writeln!(
        props_out,
        "Owner\tRepo name\tPath\tFlagged owner\tProperty name\tProperty path\tFramework\tValue"
    )?;

    let flagged: HashSet<String> = config
        .report
        .flagged_owners
        .iter()
        .map(|o| o.to_ascii_lowercase())
        .collect();

    let mut stats = CrawlStatistics::default();
    let mut seen_final: HashSet<RepoRef> = HashSet::new();

    for repo in known_universe(store, &candidates)? {
        stats.total_repos += 1;

        match resolve_outcome(store, &repo)? {
            Some((final_ref, RepoOutcome::Found { hits })) => {
                stats.repos_searched += 1;
                if !seen_final.insert(final_ref.clone()) {
                    continue;
                }

                let flag = yes_no(flagged.contains(&final_ref.owner.to_ascii_lowercase()));

                for hit in &hits {
                    stats.total_hits += 1;
                    *stats
                        .owner_hit_counts
                        .entry(final_ref.owner.clone())
                        .or_insert(0) += 1;

                    let Some(bytes) = store.get_file_content(&final_ref, &hit.path)? else {
                        stats.remaining_files += 1;
                        continue;
                    };
                    stats.downloaded_files += 1;

                    let content = String::from_utf8_lossy(&bytes);
                    let analysis = ManifestAnalysis::analyze(&content);
                    write_stats_row(&mut stats_out, &final_ref, &hit.path, flag, &analysis)?;

                    for occurrence in &analysis.interesting_values {
                        writeln!(
                            props_out,
                            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                            final_ref.owner,
                            final_ref.name,
                            hit.path,
                            flag,
                            occurrence.name,
                            occurrence.path,
                            occurrence.framework,
                            occurrence.value
                        )?;
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

    stats_out.flush()?;
    props_out.flush()?;

    tracing::info!(
        "Report written: {} manifest row(s) to {}, properties to {}",
        stats.downloaded_files,
        config.report.stats_path,
        config.report.properties_path
    );

    Ok(stats)
}

fn write_stats_row(
    out: &mut impl Write,
    repo: &RepoRef,
    path: &str,
    flag: &str,
    analysis: &ManifestAnalysis,
) -> std::io::Result<()> {
    write!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        repo.owner,
        repo.name,
        path,
        flag,
        analysis.frameworks.len(),
        analysis.top_level_dependencies,
        analysis.framework_specific_dependencies
    )?;
    for property in TRACKED_PROPERTIES {
        write!(out, "\t{}", yes_no(analysis.defines(property)))?;
    }
    writeln!(out, "\t{}", analysis.parsing_error.as_deref().unwrap_or(""))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, CrawlerConfig, ReportConfig, StorageConfig};
    use crate::storage::{FsStore, SearchHit};
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            crawler: CrawlerConfig {
                search_filename: "project.json".to_string(),
                max_concurrent_searches: 1,
                max_retry_attempts: 1,
                retry_base_delay_ms: 1,
                results_per_page: 100,
            },
            api: ApiConfig::default(),
            storage: StorageConfig {
                root: dir.path().join("storage").display().to_string(),
                repo_list: dir.path().join("repos.txt").display().to_string(),
            },
            report: ReportConfig {
                stats_path: dir.path().join("stats.tsv").display().to_string(),
                properties_path: dir.path().join("properties.tsv").display().to_string(),
                flagged_owners: vec!["bigcorp".to_string()],
            },
        }
    }

    #[test]
    fn test_generate_report_rows() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        std::fs::write(
            &config.storage.repo_list,
            "bigcorp/widgets\nacme/pending\n",
        )
        .unwrap();

        let store = FsStore::new(&config.storage.root);
        let repo = RepoRef::new("bigcorp", "widgets");
        store
            .put_outcome(
                &repo,
                &RepoOutcome::Found {
                    hits: vec![SearchHit::new("project.json")],
                },
            )
            .unwrap();
        store
            .put_file_content(
                &repo,
                "project.json",
                br#"{"version": "1.0.0", "dependencies": {"A": "1.0"}}"#,
            )
            .unwrap();

        let stats = generate_report(&config, &store).unwrap();
        assert_eq!(stats.total_repos, 2);
        assert_eq!(stats.downloaded_files, 1);
        assert_eq!(stats.remaining_repos, 1);

        let stats_tsv = std::fs::read_to_string(&config.report.stats_path).unwrap();
        let mut lines = stats_tsv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Owner\tRepo name\tPath\tFlagged owner"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("bigcorp\twidgets\tproject.json\tYes\t0\t1\t0"));

        let props_tsv = std::fs::read_to_string(&config.report.properties_path).unwrap();
        assert!(props_tsv.contains("bigcorp\twidgets\tproject.json\tYes\tversion\tversion\t\t1.0.0"));
    }

    #[test]
    fn test_parse_error_lands_in_row() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        std::fs::write(&config.storage.repo_list, "acme/broken\n").unwrap();

        let store = FsStore::new(&config.storage.root);
        let repo = RepoRef::new("acme", "broken");
        store
            .put_outcome(
                &repo,
                &RepoOutcome::Found {
                    hits: vec![SearchHit::new("project.json")],
                },
            )
            .unwrap();
        store
            .put_file_content(&repo, "project.json", b"{ nope")
            .unwrap();

        generate_report(&config, &store).unwrap();

        let stats_tsv = std::fs::read_to_string(&config.report.stats_path).unwrap();
        let row = stats_tsv.lines().nth(1).unwrap();
        let error_column = row.rsplit('\t').next().unwrap();
        assert!(!error_column.is_empty());
    }
}
