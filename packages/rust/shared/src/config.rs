//! Application configuration for contractsync.
//!
//! User config lives at `~/.contractsync/contractsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ContractSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contractsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contractsync";

// ---------------------------------------------------------------------------
// Config structs (matching contractsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Contracts API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry policy shared by API and detail-page requests.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Detail-page enrichment settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Contracts endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sort field sent as `sort_by`.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,

    /// Sort direction sent as `sort_order`.
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            sort_by: default_sort_by(),
            sort_order: default_sort_order(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_endpoint() -> String {
    "https://api.doge.gov/savings/contracts".into()
}
fn default_page_size() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_sort_by() -> String {
    "savings".into()
}
fn default_sort_order() -> String {
    "desc".into()
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts, in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_secs() -> u64 {
    10
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Maximum number of detail pages fetched concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in seconds for detail pages.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnrichmentConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_workers() -> usize {
    20
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Append-only store of raw API records.
    #[serde(default = "default_raw_csv")]
    pub raw_csv: PathBuf,

    /// Cleaned and enriched export.
    #[serde(default = "default_output_csv")]
    pub output_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_csv: default_raw_csv(),
            output_csv: default_output_csv(),
        }
    }
}

fn default_raw_csv() -> PathBuf {
    PathBuf::from("data/doge_raw_api_data.csv")
}
fn default_output_csv() -> PathBuf {
    PathBuf::from("data/doge_contracts_enriched.csv")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.api.endpoint).map_err(|e| {
            ContractSyncError::config(format!("invalid api.endpoint '{}': {e}", self.api.endpoint))
        })?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(ContractSyncError::config(format!(
                "api.endpoint must be http(s), got '{}'",
                endpoint.scheme()
            )));
        }
        if self.api.page_size == 0 {
            return Err(ContractSyncError::config("api.page_size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ContractSyncError::config("retry.max_attempts must be at least 1"));
        }
        if self.enrichment.workers == 0 {
            return Err(ContractSyncError::config("enrichment.workers must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contractsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContractSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contractsync/contractsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContractSyncError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContractSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContractSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContractSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContractSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("endpoint"));
        assert!(toml_str.contains("doge_raw_api_data.csv"));
    }

    #[test]
    fn defaults_match_upstream_constants() {
        let config = AppConfig::default();
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.sort_by, "savings");
        assert_eq!(config.api.sort_order, "desc");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_secs, 10);
        assert_eq!(config.enrichment.workers, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let toml_str = r#"
[api]
page_size = 50

[enrichment]
workers = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.api.page_size, 50);
        assert_eq!(config.api.sort_by, "savings");
        assert_eq!(config.enrichment.workers, 4);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.api.page_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("page_size"));

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_attempts"));

        let mut config = AppConfig::default();
        config.enrichment.workers = 0;
        assert!(config.validate().unwrap_err().to_string().contains("workers"));
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let mut config = AppConfig::default();
        config.api.endpoint = "ftp://example.com/contracts".into();
        assert!(config.validate().is_err());

        config.api.endpoint = "not a url".into();
        assert!(config.validate().is_err());
    }
}
