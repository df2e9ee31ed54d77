use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use repo_sift::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Searching for: {}", config.crawler.search_filename);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
search-filename = "project.json"
max-concurrent-searches = 8
max-retry-attempts = 5
retry-base-delay-ms = 250
results-per-page = 50

[api]
api-base-url = "https://api.github.com"
raw-base-url = "https://raw.githubusercontent.com"
token-file = "./token.txt"

[storage]
root = "./storage"
repo-list = "./repos.txt"

[report]
stats-path = "./stats.tsv"
properties-path = "./properties.tsv"
flagged-owners = ["dotnet", "aspnet"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.search_filename, "project.json");
        assert_eq!(config.crawler.max_concurrent_searches, 8);
        assert_eq!(config.crawler.results_per_page, 50);
        assert_eq!(config.api.token_file.as_deref(), Some("./token.txt"));
        assert_eq!(config.storage.root, "./storage");
        assert_eq!(config.report.flagged_owners.len(), 2);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config_content = r#"
[crawler]

[storage]
root = "./storage"
repo-list = "./repos.txt"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.search_filename, "project.json");
        assert_eq!(config.crawler.max_concurrent_searches, 4);
        assert_eq!(config.api.api_base_url, "https://api.github.com");
        assert_eq!(config.api.token_env, "REPO_SIFT_TOKEN");
        assert_eq!(config.report.stats_path, "./stats.tsv");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
max-concurrent-searches = 0

[storage]
root = "./storage"
repo-list = "./repos.txt"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
