use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::catalog::Agency;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub schedule: ScheduleConfig,
    /// Realtime feed endpoints. Optional: a deployment that only compacts
    /// the static archive does not need them.
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,
    /// IANA timezone for local wall-clock rendering (default: Europe/Stockholm)
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Path to the static GTFS zip archive
    pub archive: String,
    /// Directory the catalog artifacts are written to (default: public/data)
    #[serde(default = "ScheduleConfig::default_out_dir")]
    pub out_dir: String,
    /// Raw agency_id -> operator tag allow-list. Routes whose agency is not
    /// listed here are dropped during compaction.
    pub agencies: HashMap<String, Agency>,
}

impl ScheduleConfig {
    fn default_out_dir() -> String {
        "public/data".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub vehicle_positions_url: String,
    pub trip_updates_url: String,
    /// Interval in seconds between poll cycles (default: 10)
    #[serde(default = "RealtimeConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-request timeout in seconds for the feed fetches (default: 30)
    #[serde(default = "RealtimeConfig::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl RealtimeConfig {
    fn default_poll_interval_secs() -> u64 {
        10
    }
    fn default_fetch_timeout_secs() -> u64 {
        30
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn default_timezone() -> String {
        "Europe/Stockholm".to_string()
    }

    pub fn parsed_timezone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "Unknown timezone, falling back to Europe/Stockholm");
            chrono_tz::Europe::Stockholm
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
