use crate::config::types::{ApiConfig, Config, CrawlerConfig, ReportConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_storage_config(&config.storage)?;
    validate_report_config(&config.report)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.search_filename.is_empty() || config.search_filename.contains('/') {
        return Err(ConfigError::Validation(format!(
            "search-filename must be a bare file name, got '{}'",
            config.search_filename
        )));
    }

    if config.max_concurrent_searches < 1 || config.max_concurrent_searches > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-searches must be between 1 and 64, got {}",
            config.max_concurrent_searches
        )));
    }

    if config.max_retry_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retry-attempts must be >= 1, got {}",
            config.max_retry_attempts
        )));
    }

    if config.results_per_page < 1 || config.results_per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "results-per-page must be between 1 and 100, got {}",
            config.results_per_page
        )));
    }

    Ok(())
}

/// Validates API endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("api-base-url", &config.api_base_url),
        ("raw-base-url", &config.raw_base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("{key} '{value}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "{key} must be http(s), got '{value}'"
            )));
        }
    }

    if config.token_env.is_empty() {
        return Err(ConfigError::Validation(
            "token-env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation(
            "storage root cannot be empty".to_string(),
        ));
    }

    if config.repo_list.is_empty() {
        return Err(ConfigError::Validation(
            "repo-list cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates report configuration
fn validate_report_config(config: &ReportConfig) -> Result<(), ConfigError> {
    if config.stats_path.is_empty() || config.properties_path.is_empty() {
        return Err(ConfigError::Validation(
            "report paths cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                search_filename: "project.json".to_string(),
                max_concurrent_searches: 4,
                max_retry_attempts: 3,
                retry_base_delay_ms: 500,
                results_per_page: 100,
            },
            api: ApiConfig::default(),
            storage: StorageConfig {
                root: "./storage".to_string(),
                repo_list: "./repos.txt".to_string(),
            },
            report: ReportConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.crawler.max_concurrent_searches = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_filename_with_slash_rejected() {
        let mut config = valid_config();
        config.crawler.search_filename = "src/project.json".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_oversized_page_rejected() {
        let mut config = valid_config();
        config.crawler.results_per_page = 250;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_api_url_rejected() {
        let mut config = valid_config();
        config.api.api_base_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_non_http_api_url_rejected() {
        let mut config = valid_config();
        config.api.api_base_url = "ftp://example.com".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_storage_root_rejected() {
        let mut config = valid_config();
        config.storage.root = String::new();
        assert!(validate(&config).is_err());
    }
}
