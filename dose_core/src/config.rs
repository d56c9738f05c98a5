//! Configuration file support for Dosekeeper.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosekeeper/config.toml`.

use crate::time::parse_clock_time;
use crate::{Error, Result};
use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Timer and worker pool parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-dose scans
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Start scanning on the next whole minute
    #[serde(default = "default_align_to_minute")]
    pub align_to_minute: bool,

    /// Concurrent per-medicine checks
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Half-width of the due band around a slot time
    #[serde(default = "default_due_tolerance_minutes")]
    pub due_tolerance_minutes: u32,

    /// Local time of the daily taken-flag reset, `HH:mm:ss`
    #[serde(default = "default_reset_time")]
    pub reset_time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            align_to_minute: default_align_to_minute(),
            worker_count: default_worker_count(),
            due_tolerance_minutes: default_due_tolerance_minutes(),
            reset_time: default_reset_time(),
        }
    }
}

impl SchedulerConfig {
    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_interval_secs)
    }

    pub fn due_tolerance(&self) -> Duration {
        Duration::minutes(i64::from(self.due_tolerance_minutes))
    }

    pub fn reset_at(&self) -> Result<NaiveTime> {
        parse_clock_time(&self.reset_time)
            .map_err(|_| Error::Config(format!("invalid reset_time {:?}", self.reset_time)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_secs == 0 {
            return Err(Error::Config("scan_interval_secs must be positive".into()));
        }
        if self.worker_count == 0 {
            return Err(Error::Config("worker_count must be positive".into()));
        }
        self.reset_at()?;
        Ok(())
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("dosekeeper")
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_align_to_minute() -> bool {
    true
}

fn default_worker_count() -> usize {
    crate::pool::DEFAULT_WORKER_COUNT
}

fn default_due_tolerance_minutes() -> u32 {
    crate::checker::DEFAULT_TOLERANCE_MINUTES as u32
}

fn default_reset_time() -> String {
    "00:00:00".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.scheduler.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("dosekeeper").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
