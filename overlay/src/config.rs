use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::FatalError;

/// Default configuration file, relative to the working directory
pub const CONFIG_FILE: &str = "warningnav.json";

/// Environment variable naming an alternative configuration file
pub const CONFIG_ENV: &str = "WARNINGNAV_CONFIG";

const SECONDS_PER_DAY: u64 = 86_400;

/// Settings for the alert polling loop. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Seconds between the starts of two fetches
    pub fetch_interval_seconds: u64,
    /// Cycles before the poller stops; one day's worth when unset
    pub max_cycles: Option<u64>,
    pub source_url: String,
    /// Delay before the first fetch, letting the window settle
    pub initial_delay_ms: u64,
    pub user_agent: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            fetch_interval_seconds: 10,
            max_cycles: None,
            source_url: nws::DEFAULT_ALERTS_URL.to_string(),
            initial_delay_ms: 1000,
            user_agent: nws::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AlertConfig {
    /// Load from `$WARNINGNAV_CONFIG`, or `warningnav.json` when unset
    pub fn load() -> Result<Self, FatalError> {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::from_file(&path)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self, FatalError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_json(&content)?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No configuration at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(FatalError::ConfigFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, FatalError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FatalError> {
        if !(1..=SECONDS_PER_DAY).contains(&self.fetch_interval_seconds) {
            return Err(FatalError::Config(format!(
                "fetch_interval_seconds must be between 1 and {}",
                SECONDS_PER_DAY
            )));
        }
        if self.initial_delay_ms > SECONDS_PER_DAY * 1000 {
            return Err(FatalError::Config("initial_delay_ms must be at most one day".to_string()));
        }
        if self.max_cycles == Some(0) {
            return Err(FatalError::Config("max_cycles must be at least 1".to_string()));
        }
        if !(self.source_url.starts_with("https://") || self.source_url.starts_with("http://")) {
            return Err(FatalError::Config(format!("source_url {:?} is not an http(s) URL", self.source_url)));
        }
        if self.user_agent.trim().is_empty() {
            return Err(FatalError::Config("user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    /// Configured cycle budget, or one day at the configured cadence
    pub fn max_cycles(&self) -> u64 {
        self.max_cycles
            .unwrap_or(SECONDS_PER_DAY / self.fetch_interval_seconds.max(1))
            .max(1)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}
