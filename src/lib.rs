//! Repo-Sift: an incremental repository file-search crawler
//!
//! This crate walks a fixed list of repositories, searches each one for a
//! named manifest file via the hosting platform's code-search API, and
//! caches every outcome and downloaded file on disk. Interrupted runs
//! resume from the cache without redoing completed work; a report pass
//! turns the cache into tab-separated analysis files.

pub mod config;
pub mod crawler;
pub mod repo;
pub mod report;
pub mod search;
pub mod storage;

use thiserror::Error;

/// Main error type for Repo-Sift operations
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Repo-Sift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CancelFlag;
pub use repo::RepoRef;
pub use search::SearchOutcome;
pub use storage::{FsStore, RepoOutcome, ResultStore, SearchHit};
