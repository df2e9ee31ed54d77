use serde::Deserialize;

/// Main configuration structure for repo-sift
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// File name to search for in every candidate repository
    #[serde(rename = "search-filename", default = "default_search_filename")]
    pub search_filename: String,

    /// Number of concurrent crawl workers
    #[serde(rename = "max-concurrent-searches", default = "default_concurrency")]
    pub max_concurrent_searches: u32,

    /// Retry ceiling for transient remote failures before an outcome is
    /// recorded as degraded
    #[serde(rename = "max-retry-attempts", default = "default_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Search results requested per page
    #[serde(rename = "results-per-page", default = "default_results_per_page")]
    pub results_per_page: u32,
}

/// Remote API endpoints and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the hosting platform's REST API
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL for raw file content downloads
    #[serde(rename = "raw-base-url", default = "default_raw_base_url")]
    pub raw_base_url: String,

    /// Optional file whose first line is an access token
    #[serde(rename = "token-file", default)]
    pub token_file: Option<String>,

    /// Environment variable consulted when no token file is configured
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,
}

/// Cache and candidate list locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the on-disk result cache
    pub root: String,

    /// Newline-delimited `owner/name` candidate list
    #[serde(rename = "repo-list")]
    pub repo_list: String,
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Path of the per-manifest TSV report
    #[serde(rename = "stats-path", default = "default_stats_path")]
    pub stats_path: String,

    /// Path of the per-property-occurrence TSV report
    #[serde(rename = "properties-path", default = "default_properties_path")]
    pub properties_path: String,

    /// Owners highlighted with a Yes flag in report rows
    #[serde(rename = "flagged-owners", default)]
    pub flagged_owners: Vec<String>,
}

impl ApiConfig {
    /// Resolves the access token: token file first (first line), then the
    /// configured environment variable. Absent token means unauthenticated
    /// mode with the smaller rate budget.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(path) = &self.token_file {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let token = content.lines().next().unwrap_or("").trim().to_string();
                    if !token.is_empty() {
                        return Some(token);
                    }
                    tracing::warn!("Token file {} is empty, ignoring", path);
                }
                Err(e) => {
                    tracing::warn!("Could not read token file {}: {}", path, e);
                }
            }
        }

        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            raw_base_url: default_raw_base_url(),
            token_file: None,
            token_env: default_token_env(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stats_path: default_stats_path(),
            properties_path: default_properties_path(),
            flagged_owners: Vec::new(),
        }
    }
}

fn default_search_filename() -> String {
    "project.json".to_string()
}

fn default_concurrency() -> u32 {
    4
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_results_per_page() -> u32 {
    100
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_token_env() -> String {
    "REPO_SIFT_TOKEN".to_string()
}

fn default_stats_path() -> String {
    "./stats.tsv".to_string()
}

fn default_properties_path() -> String {
    "./properties.tsv".to_string()
}
