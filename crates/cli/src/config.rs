//! Configuration management for the CLI
//!
//! Defaults come from a JSON file and `AZMIG_*` environment variables;
//! command-line flags override both.

use anyhow::{Context, Result};
use inventory_lib::config::{DEFAULT_CONCURRENCY, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_SKU_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values read from the config file and environment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Worker count
    pub concurrency: Option<usize>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Per-request timeout for the SKU catalog in seconds
    pub sku_timeout_secs: Option<u64>,
    /// Retries for throttled or unavailable API calls
    pub max_retries: Option<u32>,
    /// Resource Manager base URL
    pub management_endpoint: Option<String>,
    /// Log Analytics query API base URL
    pub log_analytics_endpoint: Option<String>,
}

impl FileConfig {
    /// Load from `path`, or from the default location when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => match default_config_path() {
                Some(path) => config::File::from(path).required(false),
                None => config::File::with_name("azmig").required(false),
            },
        };

        let config = config::Config::builder()
            .add_source(file.format(config::FileFormat::Json))
            .add_source(config::Environment::with_prefix("AZMIG").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}

/// `~/.config/azmig/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("azmig").join("config.json"))
}

/// Settings after layering flags over file and environment values
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub sku_timeout: Duration,
    pub max_retries: u32,
    pub management_endpoint: Option<String>,
    pub log_analytics_endpoint: Option<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub sku_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub management_endpoint: Option<String>,
    pub log_analytics_endpoint: Option<String>,
}

impl Settings {
    pub fn resolve(flags: FlagOverrides, file: FileConfig) -> Self {
        let timeout = flags
            .timeout_secs
            .or(file.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT);
        let sku_timeout = flags
            .sku_timeout_secs
            .or(file.sku_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SKU_TIMEOUT);

        Self {
            concurrency: flags
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            timeout,
            sku_timeout,
            max_retries: flags.max_retries.or(file.max_retries).unwrap_or(0),
            management_endpoint: flags.management_endpoint.or(file.management_endpoint),
            log_analytics_endpoint: flags.log_analytics_endpoint.or(file.log_analytics_endpoint),
        }
    }
}
