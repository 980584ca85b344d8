//! Configuration management for hashledger

use crate::blockchain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use crate::miner::CANCEL_CHECK_INTERVAL;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "hashledger.toml";
/// Environment variable overriding [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "HASHLEDGER_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,
    #[serde(default)]
    pub indexed_queries: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            indexed_queries: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_cancel_check_interval")]
    pub cancel_check_interval: u64,
    /// Upper bound on a single mining request; unbounded when absent
    #[serde(default)]
    pub max_mining_secs: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            cancel_check_interval: default_cancel_check_interval(),
            max_mining_secs: None,
        }
    }
}

impl MinerConfig {
    pub fn mining_timeout(&self) -> Option<Duration> {
        self.max_mining_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Snapshot file loaded at startup and written on shutdown
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default = "default_save_on_shutdown")]
    pub save_on_shutdown: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            save_on_shutdown: default_save_on_shutdown(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidConfig(format!(
                "ledger.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if !self.ledger.mining_reward.is_finite() {
            return Err(LedgerError::InvalidConfig(
                "ledger.mining_reward must be a finite number".to_string(),
            ));
        }
        if self.miner.cancel_check_interval == 0 {
            return Err(LedgerError::InvalidConfig(
                "miner.cancel_check_interval must be greater than zero".to_string(),
            ));
        }
        if self.api.host.is_empty() {
            return Err(LedgerError::InvalidConfig("api.host must be set".to_string()));
        }
        Ok(())
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(data).map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Load `hashledger.toml` (or the file named by `HASHLEDGER_CONFIG`),
/// falling back to defaults when it does not exist.
pub fn load_config() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(path)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    Config::from_toml(&config_str)
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_mining_reward() -> f64 {
    DEFAULT_MINING_REWARD
}

fn default_cancel_check_interval() -> u64 {
    CANCEL_CHECK_INTERVAL
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_save_on_shutdown() -> bool {
    true
}
