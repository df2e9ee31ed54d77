//! Crawl driver - the resumable outer loop
//!
//! This module contains the main crawl logic that:
//! - Walks the candidate list with a bounded pool of workers
//! - Skips every repository the cache has already resolved
//! - Interprets search outcomes (found / not-found / renamed / transient)
//! - Follows rename chains to a fixed point with cycle detection
//! - Persists one durable outcome per repository
//!
//! Each repository's resolution is the unit of atomicity: cancellation is
//! only observed between repositories, and a completed repository never
//! needs to be re-crawled.

use crate::config::Config;
use crate::crawler::CancelFlag;
use crate::repo::RepoRef;
use crate::search::{Backoff, SearchClient, SearchOutcome};
use crate::storage::{RepoOutcome, ResultStore, SearchHit};
use crate::SiftError;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters accumulated over one crawl run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlTotals {
    /// Outcomes newly written this run
    pub resolved: usize,

    /// Candidates skipped because the cache already had an outcome
    pub skipped: usize,

    /// Rename edges recorded this run
    pub renames: usize,

    /// Outcomes recorded as degraded after retry exhaustion
    pub degraded: usize,
}

impl CrawlTotals {
    fn merge(&mut self, other: CrawlTotals) {
        self.resolved += other.resolved;
        self.skipped += other.skipped;
        self.renames += other.renames;
        self.degraded += other.degraded;
    }
}

/// Terminal interpretation of a repository search after driver-side
/// retries.
enum Resolution {
    Found(Vec<SearchHit>),
    NotFound,
    Renamed(RepoRef),
    Degraded(String),
}

/// The resumable crawl driver.
#[derive(Clone)]
pub struct Driver {
    config: Arc<Config>,
    store: Arc<dyn ResultStore>,
    client: Arc<SearchClient>,
    cancel: CancelFlag,
}

impl Driver {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ResultStore>,
        client: Arc<SearchClient>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            config,
            store,
            client,
            cancel,
        }
    }

    /// Runs the crawl over the candidate list.
    ///
    /// Workers pull candidates from a shared queue until it drains or
    /// cancellation is requested. A storage failure aborts the whole run;
    /// everything resolved before the failure is already durable.
    pub async fn run(&self, candidates: Vec<RepoRef>) -> Result<CrawlTotals, SiftError> {
        let total = candidates.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(candidates)));
        let progress = Arc::new(AtomicUsize::new(0));

        let worker_count = self.config.crawler.max_concurrent_searches as usize;
        tracing::info!(
            "Starting crawl: {} candidate(s), {} worker(s)",
            total,
            worker_count
        );

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let driver = self.clone();
            let queue = Arc::clone(&queue);
            let progress = Arc::clone(&progress);
            handles.push(tokio::spawn(async move {
                driver.worker_loop(queue, progress, total).await
            }));
        }

        let mut totals = CrawlTotals::default();
        let mut first_error = None;
        for handle in handles {
            match handle.await? {
                Ok(worker_totals) => totals.merge(worker_totals),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let remaining = queue.lock().unwrap().len();
        if remaining > 0 {
            tracing::info!(
                "Crawl cancelled: {} candidate(s) left for the next run",
                remaining
            );
        }
        tracing::info!(
            "Crawl finished: {} resolved ({} degraded), {} skipped, {} rename(s)",
            totals.resolved,
            totals.degraded,
            totals.skipped,
            totals.renames
        );

        Ok(totals)
    }

    async fn worker_loop(
        &self,
        queue: Arc<Mutex<VecDeque<RepoRef>>>,
        progress: Arc<AtomicUsize>,
        total: usize,
    ) -> Result<CrawlTotals, SiftError> {
        let mut totals = CrawlTotals::default();

        loop {
            // Cancellation is observed only between repositories so a
            // single repository's outcome is never torn.
            if self.cancel.is_cancelled() {
                break;
            }

            let next = queue.lock().unwrap().pop_front();
            let Some(repo) = next else { break };

            if let Err(e) = self.resolve(&repo, &mut totals).await {
                tracing::error!("Aborting crawl on storage failure: {}", e);
                self.cancel.cancel();
                return Err(e);
            }

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 100 == 0 {
                tracing::info!("Progress: {}/{} candidates processed", done, total);
            }
        }

        Ok(totals)
    }

    /// Resolves one candidate to a terminal cached outcome, following
    /// rename edges (cached or freshly discovered) to a fixed point.
    async fn resolve(&self, start: &RepoRef, totals: &mut CrawlTotals) -> Result<(), SiftError> {
        let filename = &self.config.crawler.search_filename;
        let mut visited: HashSet<RepoRef> = HashSet::new();
        let mut current = start.clone();

        loop {
            if !visited.insert(current.clone()) {
                tracing::warn!(
                    "Rename cycle detected at {} while resolving {}, recording as not found",
                    current,
                    start
                );
                self.store
                    .put_outcome(&current, &RepoOutcome::NotFound { degraded: false })?;
                totals.resolved += 1;
                return Ok(());
            }

            if self.store.has_outcome(&current)? {
                tracing::trace!("{} already resolved, skipping", current);
                totals.skipped += 1;
                return Ok(());
            }

            if let Some(target) = self.store.resolve_rename(&current)? {
                tracing::debug!("Following cached rename {} -> {}", current, target);
                current = target;
                continue;
            }

            match self.search_with_retries(&current, filename).await {
                Resolution::Found(hits) => {
                    tracing::info!("{}: search complete, {} hit(s)", current, hits.len());
                    self.store
                        .put_outcome(&current, &RepoOutcome::Found { hits })?;
                    totals.resolved += 1;
                    return Ok(());
                }

                Resolution::NotFound => {
                    tracing::info!("{}: repository not found", current);
                    self.store
                        .put_outcome(&current, &RepoOutcome::NotFound { degraded: false })?;
                    totals.resolved += 1;
                    return Ok(());
                }

                Resolution::Renamed(target) => {
                    tracing::info!("{} renamed to {}", current, target);
                    self.store.record_rename(&current, &target)?;
                    totals.renames += 1;
                    current = target;
                }

                Resolution::Degraded(reason) => {
                    tracing::warn!(
                        "{}: giving up after repeated transient failures ({}), \
                         recording degraded not-found",
                        current,
                        reason
                    );
                    self.store
                        .put_outcome(&current, &RepoOutcome::NotFound { degraded: true })?;
                    totals.resolved += 1;
                    totals.degraded += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Calls the search client, retrying transient failures with backoff
    /// up to the configured attempt ceiling.
    async fn search_with_retries(&self, repo: &RepoRef, filename: &str) -> Resolution {
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.crawler.retry_base_delay_ms),
            self.config.crawler.max_retry_attempts,
        );

        loop {
            match self.client.search(repo, filename).await {
                SearchOutcome::Found { hits } => return Resolution::Found(hits),
                SearchOutcome::NotFound => return Resolution::NotFound,
                SearchOutcome::Renamed { target } => return Resolution::Renamed(target),
                SearchOutcome::Transient { reason } => match backoff.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "Transient failure searching {}: {}; retrying in {:?}",
                            repo,
                            reason,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Resolution::Degraded(reason),
                },
            }
        }
    }
}
