//! Crawler module for repository search and file download
//!
//! This module contains the core crawl logic, including:
//! - The resumable crawl driver with its bounded worker pool
//! - Rename-chain following with cycle detection
//! - The decoupled, independently resumable download pass
//! - Cooperative cancellation

mod download;
mod driver;

pub use download::{DownloadTotals, Downloader};
pub use driver::{CrawlTotals, Driver};

use crate::config::Config;
use crate::repo::load_candidate_list;
use crate::search::SearchClient;
use crate::storage::FsStore;
use crate::SiftError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared by all workers.
///
/// Workers check it between repositories, so setting it stops the crawl
/// cleanly: nothing rolls back, every completed repository is already
/// durable.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the candidate repository list
/// 2. Open the result cache
/// 3. Resolve credentials and build the search client
/// 4. Resolve every candidate not already cached
///
/// Restarting after an interruption re-walks the full list but performs
/// no redundant remote work.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Cancellation flag, typically wired to Ctrl-C
///
/// # Returns
///
/// * `Ok(CrawlTotals)` - Crawl completed (or was cancelled cleanly)
/// * `Err(SiftError)` - Crawl aborted
pub async fn crawl(config: Config, cancel: CancelFlag) -> Result<CrawlTotals, SiftError> {
    let candidates = load_candidate_list(Path::new(&config.storage.repo_list))?;
    let store = Arc::new(FsStore::new(&config.storage.root));

    let token = config.api.resolve_token();
    match &token {
        Some(_) => tracing::info!("Using authenticated mode"),
        None => tracing::info!("No access token found, using unauthenticated mode"),
    }

    let client = Arc::new(SearchClient::new(&config, token)?);
    let driver = Driver::new(Arc::new(config), store, client, cancel);
    driver.run(candidates).await
}

/// Runs the download pass over every cached `Found` outcome.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Cancellation flag, typically wired to Ctrl-C
pub async fn download(config: Config, cancel: CancelFlag) -> Result<DownloadTotals, SiftError> {
    let store = Arc::new(FsStore::new(&config.storage.root));
    let downloader = Downloader::new(Arc::new(config), store, cancel)?;
    downloader.run().await
}
