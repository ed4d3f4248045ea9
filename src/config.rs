use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Could not serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the router monitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RouterOS API connection
    pub router: RouterConfig,
    /// Failure classification and brute force rule
    pub detection: DetectionConfig,
    /// Ledger and report locations
    pub storage: StorageConfig,
    /// Report viewer
    pub display: DisplayConfig,
    /// Daemon polling cadence
    pub schedule: ScheduleConfig,
}

/// RouterOS API connection settings
///
/// Credentials are handed to the API as-is and never logged.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Read/write timeout on the API socket, none if unset
    pub timeout_seconds: Option<u64>,
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Failure keywords and brute force thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum failures from one IP to raise an alert
    pub threshold: usize,
    /// Maximum span in seconds between first and last failure
    pub window_seconds: i64,
    /// Case-insensitive substrings that mark a login failure
    pub keywords: Vec<String>,
}

/// Where the ledger and report artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub ledger_path: PathBuf,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open each report in the desktop's default viewer
    pub open_artifacts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between passes in daemon mode
    pub interval_seconds: u64,
}

pub const DEFAULT_KEYWORDS: [&str; 4] = ["login failure", "failed", "denied", "invalid"];

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            host: "192.168.88.1".to_string(),
            port: 8728,
            username: "admin".to_string(),
            password: String::new(),
            timeout_seconds: None,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            threshold: 2,
            window_seconds: 300,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            ledger_path: PathBuf::from("failed_logins_master.csv"),
            report_dir: PathBuf::from("."),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig { open_artifacts: true }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig { interval_seconds: 300 }
    }
}

impl DetectionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_seconds)
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// Files ending in `.json` are read as JSON, everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config: Config = if is_json {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the detector cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.threshold == 0 {
            return Err(ConfigError::Invalid("detection.threshold must be at least 1".into()));
        }
        if self.detection.window_seconds < 0 {
            return Err(ConfigError::Invalid("detection.window_seconds must not be negative".into()));
        }
        if self.detection.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("detection.keywords must not be empty".into()));
        }
        if self.schedule.interval_seconds == 0 {
            return Err(ConfigError::Invalid("schedule.interval_seconds must be at least 1".into()));
        }
        Ok(())
    }
}
