//! Download pass for matched files
//!
//! Downloading is decoupled from searching: for every `Found` outcome in
//! the cache, every hit path missing from the file cache is fetched from
//! the raw-content endpoint. The pass can be interrupted and re-run any
//! number of times; already-cached files cost nothing.

use crate::config::Config;
use crate::crawler::CancelFlag;
use crate::repo::RepoRef;
use crate::search::{build_http_client, Backoff};
use crate::storage::ResultStore;
use crate::SiftError;
use reqwest::{Client, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Counters accumulated over one download pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadTotals {
    /// Files fetched and cached this run
    pub downloaded: usize,

    /// Files already present in the cache
    pub cached: usize,

    /// Files that could not be fetched (missing upstream or persistent
    /// transient failures); retried on the next run
    pub failed: usize,
}

impl DownloadTotals {
    fn merge(&mut self, other: DownloadTotals) {
        self.downloaded += other.downloaded;
        self.cached += other.cached;
        self.failed += other.failed;
    }
}

enum Fetched {
    Content(Vec<u8>),
    Missing,
    Transient(String),
}

/// Fetches raw content for every cached search hit.
#[derive(Clone)]
pub struct Downloader {
    config: Arc<Config>,
    store: Arc<dyn ResultStore>,
    http: Client,
    raw_base: Url,
    cancel: CancelFlag,
}

impl Downloader {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ResultStore>,
        cancel: CancelFlag,
    ) -> Result<Self, SiftError> {
        let raw_base = Url::parse(&config.api.raw_base_url)?;
        Ok(Self {
            config,
            store,
            http: build_http_client()?,
            raw_base,
            cancel,
        })
    }

    /// Runs the download pass over every known repository.
    pub async fn run(&self) -> Result<DownloadTotals, SiftError> {
        let repos = self.store.list_known_repos()?;
        let total = repos.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(repos)));

        let worker_count = self.config.crawler.max_concurrent_searches as usize;
        tracing::info!(
            "Starting download pass: {} known repositories, {} worker(s)",
            total,
            worker_count
        );

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let downloader = self.clone();
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(
                async move { downloader.worker_loop(queue).await },
            ));
        }

        let mut totals = DownloadTotals::default();
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

        tracing::info!(
            "Download pass finished: {} fetched, {} already cached, {} failed",
            totals.downloaded,
            totals.cached,
            totals.failed
        );

        Ok(totals)
    }

    async fn worker_loop(
        &self,
        queue: Arc<Mutex<VecDeque<RepoRef>>>,
    ) -> Result<DownloadTotals, SiftError> {
        let mut totals = DownloadTotals::default();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let next = queue.lock().unwrap().pop_front();
            let Some(repo) = next else { break };

            if let Err(e) = self.download_repo(&repo, &mut totals).await {
                tracing::error!("Aborting download pass on storage failure: {}", e);
                self.cancel.cancel();
                return Err(e);
            }
        }

        Ok(totals)
    }

    /// Fetches every missing hit for one repository.
    async fn download_repo(
        &self,
        repo: &RepoRef,
        totals: &mut DownloadTotals,
    ) -> Result<(), SiftError> {
        let Some(outcome) = self.store.get_outcome(repo)? else {
            return Ok(());
        };
        let Some(hits) = outcome.hits().map(<[_]>::to_vec) else {
            return Ok(());
        };

        for hit in &hits {
            if self.store.has_file(repo, &hit.path)? {
                totals.cached += 1;
                continue;
            }

            match self.fetch_file(repo, &hit.path).await {
                Fetched::Content(bytes) => {
                    self.store.put_file_content(repo, &hit.path, &bytes)?;
                    tracing::debug!("Downloaded {} from {} ({} bytes)", hit.path, repo, bytes.len());
                    totals.downloaded += 1;
                }
                Fetched::Missing => {
                    // The search index can be ahead of the repository
                    // content; tolerated, retried on the next pass.
                    tracing::warn!("{} no longer has {}, skipping", repo, hit.path);
                    totals.failed += 1;
                }
                Fetched::Transient(reason) => {
                    tracing::warn!(
                        "Could not download {} from {}: {}; will retry on the next run",
                        hit.path,
                        repo,
                        reason
                    );
                    totals.failed += 1;
                }
            }
        }

        Ok(())
    }

    /// Fetches one file's raw content at the repository's HEAD, retrying
    /// transient failures with backoff.
    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Fetched {
        let mut url = self.raw_base.clone();
        {
            let Ok(mut segments) = url.path_segments_mut() else {
                return Fetched::Transient(format!(
                    "raw base URL cannot hold a path: {}",
                    self.raw_base
                ));
            };
            segments
                .pop_if_empty()
                .push(&repo.owner)
                .push(&repo.name)
                .push("HEAD")
                .extend(path.split('/'));
        }

        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.crawler.retry_base_delay_ms),
            self.config.crawler.max_retry_attempts,
        );

        loop {
            let failure = match self.http.get(url.clone()).send().await {
                Ok(response) => match response.status() {
                    StatusCode::OK => match response.bytes().await {
                        Ok(bytes) => return Fetched::Content(bytes.to_vec()),
                        Err(e) => format!("body read failed: {e}"),
                    },
                    StatusCode::NOT_FOUND => return Fetched::Missing,
                    status => format!("HTTP {status}"),
                },
                Err(e) => format!("request failed: {e}"),
            };

            match backoff.next_delay() {
                Some(delay) => {
                    tracing::debug!(
                        "Transient failure downloading {} from {}: {}; retrying in {:?}",
                        path,
                        repo,
                        failure,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Fetched::Transient(failure),
            }
        }
    }
}
