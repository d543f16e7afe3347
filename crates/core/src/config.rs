//! Application configuration.
//!
//! Settings come from built-in defaults, an optional TOML file in the user's
//! config directory, and `CAPWORLD_*` environment variables, in that order.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::SpeedLevel;

/// Directory under the platform config dir holding our files.
pub const CONFIG_DIR_NAME: &str = "capworld";
/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "CAPWORLD";

const DEFAULT_CONFIG: &str = r#"# Capitalist World configuration.

# Milliseconds between clock ticks (status line refresh rate).
tick_interval_ms = 100

# Simulated calendar date the clock starts from.
start_date = "2000-01-01"

# Speed level at startup: 0 (paused) through 5.
initial_speed = 1

# Opening cash balance, in whole currency units.
starting_balance = 100000

currency_symbol = "$"

# Where capworld.log is written.
log_dir = "logs"
"#;

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Milliseconds between clock ticks.
    pub tick_interval_ms: u64,
    /// Calendar date simulated time starts at (midnight UTC).
    pub start_date: NaiveDate,
    /// Speed level the clock starts with.
    pub initial_speed: SpeedLevel,
    /// Opening balance shown in the status line.
    pub starting_balance: i64,
    /// Symbol prefixed to money amounts.
    pub currency_symbol: String,
    /// Directory for log files.
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            initial_speed: SpeedLevel::X1,
            starting_balance: 100_000,
            currency_symbol: "$".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load from the default config file location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (missing files are fine) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Tick period for the clock ticker.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Simulated timestamp the clock starts at.
    pub fn start_time(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start_date.and_time(NaiveTime::MIN))
    }
}

/// Location of the configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Write a commented default configuration if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path()).map(|_| ())
}

/// Write the default configuration to `path` unless a file is already there.
/// Returns whether a file was written.
pub fn write_default_config(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(true)
}
