//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default matching the production deployment, so a
//! partial (or missing) file is valid.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Placeholder substituted with the account ID in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub scan: ScanConfig,
    pub pool: PoolConfig,
    pub storage: StorageConfig,
}

/// Upstream endpoints.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Address lookup template, e.g. `https://host/user/{id}/address`.
    pub address_url: String,
    /// Trading statistics template, e.g. `https://host/pnl?account_id={id}`.
    pub stats_url: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address_url: "https://sodex.dev/mainnet/chain/user/{id}/address".to_string(),
            stats_url: "https://mainnet-data.sodex.dev/api/v1/perps/pnl/overview?account_id={id}"
                .to_string(),
            user_agent: "sodex-crawler/0.1.0".to_string(),
        }
    }
}

/// Per-request timeout and retry budget.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    /// Lowest account ID the platform ever assigned (the floor).
    pub start_id: u64,
    pub probe_stride: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_id: 1000,
            probe_stride: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    pub concurrency: usize,
    /// Emit a progress event every N produced records.
    pub progress_every: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "sodex_data.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.api.address_url.contains(ID_PLACEHOLDER),
            "api.address_url must contain {ID_PLACEHOLDER}"
        );
        ensure!(
            self.api.stats_url.contains(ID_PLACEHOLDER),
            "api.stats_url must contain {ID_PLACEHOLDER}"
        );
        ensure!(self.pool.concurrency > 0, "pool.concurrency must be at least 1");
        ensure!(self.pool.progress_every > 0, "pool.progress_every must be at least 1");
        ensure!(self.scan.probe_stride > 0, "scan.probe_stride must be at least 1");
        Ok(())
    }
}
