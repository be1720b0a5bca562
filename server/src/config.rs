//! Configuration management for the server.

use custody_engine::ImportPolicy;
use std::{env, path::PathBuf, time::Duration};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory holding one JSON file per stored key
    pub data_dir: PathBuf,
    /// Spreadsheet script endpoint
    pub sheets_url: Option<String>,
    /// Whether the background poller starts at boot
    pub sheets_enabled: bool,
    /// Base poll interval
    pub sync_interval: Duration,
    /// Novelty signal precedence for imports
    pub import_policy: ImportPolicy,
    /// Timeout applied to every spreadsheet call
    pub request_timeout: Duration,
    /// Whether local changes are pushed to the spreadsheet
    pub push_enabled: bool,
    /// Base URL of a REST document store; enables cloud mode
    pub cloud_url: Option<String>,
    /// How often cloud snapshots are fetched
    pub cloud_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            sheets_url: None,
            sheets_enabled: false,
            sync_interval: Duration::from_secs(15),
            import_policy: ImportPolicy::default(),
            request_timeout: Duration::from_millis(8000),
            push_enabled: true,
            cloud_url: None,
            cloud_poll_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let sheets_url = non_empty("SHEETS_URL");
        let sheets_enabled = flag("SHEETS_ENABLED", sheets_url.is_some())?;
        if sheets_enabled && sheets_url.is_none() {
            return Err(ConfigError::MissingSheetsUrl);
        }

        let sync_interval = seconds("SYNC_INTERVAL_SECS", defaults.sync_interval)?;
        let cloud_poll_interval = seconds("CLOUD_POLL_SECS", defaults.cloud_poll_interval)?;

        let request_timeout = match env::var("REQUEST_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or(ConfigError::InvalidNumber("REQUEST_TIMEOUT_MS"))?,
            Err(_) => defaults.request_timeout,
        };

        let import_policy = match env::var("SYNC_SIGNALS") {
            Ok(raw) => ImportPolicy::parse(&raw).map_err(|e| ConfigError::InvalidSignals(e.to_string()))?,
            Err(_) => defaults.import_policy,
        };

        let push_enabled = flag("PUSH_ENABLED", defaults.push_enabled)?;
        let cloud_url = non_empty("CLOUD_URL");

        Ok(Self {
            host,
            port,
            data_dir,
            sheets_url,
            sheets_enabled,
            sync_interval,
            import_policy,
            request_timeout,
            push_enabled,
            cloud_url,
            cloud_poll_interval,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag(key)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn seconds(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidNumber(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("SHEETS_ENABLED is set but SHEETS_URL is missing")]
    MissingSheetsUrl,

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),

    #[error("{0} must be true or false")]
    InvalidFlag(&'static str),

    #[error("Invalid SYNC_SIGNALS: {0}")]
    InvalidSignals(String),
}
