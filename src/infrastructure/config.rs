//! Configuration infrastructure
//!
//! One JSON file holds every section. Missing sections and fields fall back
//! to the values in [`defaults`], so older files keep loading as the config
//! grows.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::product::Category;
use crate::domain::services::FetchPolicy;

pub const APP_DIR_NAME: &str = "keycraft-harvester";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub harvest: HarvestConfig,
    pub fetcher: FetcherConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub maintenance: MaintenanceConfig,
}

/// What to harvest and how politely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Categories harvested in a normal run, in order
    pub categories: Vec<Category>,

    /// Categories harvested with `--dev`
    pub dev_categories: Vec<Category>,

    /// Retailer profile keys to run; empty means all built-in profiles
    pub retailers: Vec<String>,

    /// Delay before every fetch attempt in milliseconds
    pub request_delay_ms: u64,

    /// Fetch attempts per URL
    pub max_retries: u32,

    /// Pause between categories in milliseconds
    pub category_cooldown_ms: u64,

    /// Where the JSON export is written after a run
    pub export_path: PathBuf,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub request_timeout_seconds: u64,

    /// Upper bound on request rate across the whole run
    pub max_requests_per_second: u32,

    /// Pool the client picks a User-Agent from on every attempt
    pub user_agents: Vec<String>,

    /// Bodies smaller than this are logged as suspicious
    pub small_body_warning_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLx connection URL. `None` uses the file under the app data directory.
    pub url: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub directory: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

/// Thresholds for `clean` and `analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Prices above this are treated as scrape errors and removed
    pub suspicious_price_threshold: f64,

    /// Prices above this are listed as expensive in the analysis
    pub expensive_price_threshold: f64,

    /// How many expensive items the analysis lists
    pub expensive_items_listed: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            categories: defaults::CATEGORIES.to_vec(),
            dev_categories: defaults::DEV_CATEGORIES.to_vec(),
            retailers: Vec::new(),
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            max_retries: defaults::MAX_RETRIES,
            category_cooldown_ms: defaults::CATEGORY_COOLDOWN_MS,
            export_path: PathBuf::from(defaults::EXPORT_FILE_NAME),
        }
    }
}

impl HarvestConfig {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::new(Duration::from_millis(self.request_delay_ms), self.max_retries)
    }

    pub fn category_cooldown(&self) -> Duration {
        Duration::from_millis(self.category_cooldown_ms)
    }

    pub fn categories_for(&self, dev_mode: bool) -> &[Category] {
        if dev_mode {
            &self.dev_categories
        } else {
            &self.categories
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agents: defaults::USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            small_body_warning_bytes: defaults::SMALL_BODY_WARNING_BYTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("sqlx".to_string(), "warn".to_string());
        module_filters.insert("reqwest".to_string(), "info".to_string());
        module_filters.insert("hyper".to_string(), "warn".to_string());
        module_filters.insert("html5ever".to_string(), "warn".to_string());
        module_filters.insert("selectors".to_string(), "warn".to_string());

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            suspicious_price_threshold: defaults::SUSPICIOUS_PRICE_THRESHOLD,
            expensive_price_threshold: defaults::EXPENSIVE_PRICE_THRESHOLD,
            expensive_items_listed: defaults::EXPENSIVE_ITEMS_LISTED,
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the default config location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist.
    ///
    /// A file that does not parse is copied to `*.json.corrupted` and
    /// replaced with defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("Configuration file could not be parsed: {}", parse_error);
                warn!("Resetting to default configuration");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                self.reset_to_defaults().await
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        let default_config = AppConfig::default();
        self.save_config(&default_config)
            .await
            .context("Failed to save default configuration")?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// SQLx URL for the configured database, creating the data directory for
/// the default file location
pub fn resolve_database_url(config: &DatabaseConfig) -> Result<String> {
    if let Some(url) = &config.url {
        return Ok(url.clone());
    }

    let database_dir = ConfigManager::get_app_data_dir()?.join("database");
    std::fs::create_dir_all(&database_dir)
        .with_context(|| format!("Failed to create directory: {}", database_dir.display()))?;

    Ok(format!("sqlite:{}", database_dir.join(defaults::DATABASE_FILE_NAME).display()))
}

/// Default configuration values
pub mod defaults {
    use crate::domain::product::Category;

    /// Delay before each fetch attempt in milliseconds
    pub const REQUEST_DELAY_MS: u64 = 2000;

    /// Fetch attempts per URL
    pub const MAX_RETRIES: u32 = 3;

    /// Pause between categories in milliseconds
    pub const CATEGORY_COOLDOWN_MS: u64 = 3000;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 15;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const SMALL_BODY_WARNING_BYTES: usize = 1000;

    pub const CATEGORIES: [Category; 5] = Category::HARVESTABLE;

    pub const DEV_CATEGORIES: [Category; 2] = [Category::Switches, Category::Keycaps];

    pub const EXPORT_FILE_NAME: &str = "latest-export.json";

    pub const DATABASE_FILE_NAME: &str = "keyboard_parts.db";

    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ];

    pub const SUSPICIOUS_PRICE_THRESHOLD: f64 = 5000.0;

    pub const EXPENSIVE_PRICE_THRESHOLD: f64 = 1000.0;

    pub const EXPENSIVE_ITEMS_LISTED: usize = 10;

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = true;

    pub const LOG_MAX_FILES: u32 = 5;

    pub const LOG_AUTO_CLEANUP: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_first_load_writes_defaults() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("nested").join(CONFIG_FILE_NAME));

        let config = manager.load_config().await?;
        assert_eq!(config, AppConfig::default());
        assert!(manager.config_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, r#"{"harvest": {"request_delay_ms": 10, "categories": ["pcb"]}}"#).await?;

        let config = ConfigManager::with_path(&path).load_config().await?;
        assert_eq!(config.harvest.request_delay_ms, 10);
        assert_eq!(config.harvest.categories, vec![Category::Pcb]);
        assert_eq!(config.harvest.max_retries, defaults::MAX_RETRIES);
        assert_eq!(config.fetcher.request_timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up_and_reset() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "{ not json").await?;

        let config = ConfigManager::with_path(&path).load_config().await?;
        assert_eq!(config, AppConfig::default());
        assert!(path.with_extension("json.corrupted").exists());
        Ok(())
    }

    #[test]
    fn test_harvest_helpers() {
        let harvest = HarvestConfig::default();
        assert_eq!(harvest.fetch_policy().delay, Duration::from_secs(2));
        assert_eq!(harvest.fetch_policy().max_retries, 3);
        assert_eq!(harvest.category_cooldown(), Duration::from_secs(3));
        assert_eq!(harvest.categories_for(true), &[Category::Switches, Category::Keycaps]);
        assert_eq!(harvest.categories_for(false).len(), 5);
    }

    #[test]
    fn test_explicit_database_url_wins() -> Result<()> {
        let config = DatabaseConfig {
            url: Some("sqlite::memory:".to_string()),
        };
        assert_eq!(resolve_database_url(&config)?, "sqlite::memory:");
        Ok(())
    }
}
