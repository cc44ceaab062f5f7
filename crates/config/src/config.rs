use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sharechain_common::logging::{LoggingInitConfig, Rotation};
use thiserror::Error;

/// Default value for `max_shares_per_request` in [`RelayConfig`].
const DEFAULT_MAX_SHARES_PER_REQUEST: u64 = 1000;

/// Default value for `broadcast_depth` in [`RelayConfig`].
const DEFAULT_BROADCAST_DEPTH: u64 = 5;

/// Default value for `download_parents` in [`RelayConfig`].
const DEFAULT_DOWNLOAD_PARENTS: u64 = 500;

/// Default log file prefix when `log_dir` is set.
const DEFAULT_LOG_FILE_PREFIX: &str = "sharechain";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid relay config: {0}")]
    Relay(&'static str),
}

/// How shares are exchanged with peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Upper bound on shares returned for a single ancestor request, split evenly between
    /// the requested hashes.
    #[serde(default = "default_max_shares_per_request")]
    pub max_shares_per_request: u64,

    /// How many shares below a new best share are offered to peers.
    #[serde(default = "default_broadcast_depth")]
    pub broadcast_depth: u64,

    /// How many parents to ask for when a share arrives with an unknown predecessor.
    #[serde(default = "default_download_parents")]
    pub download_parents: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_shares_per_request: DEFAULT_MAX_SHARES_PER_REQUEST,
            broadcast_depth: DEFAULT_BROADCAST_DEPTH,
            download_parents: DEFAULT_DOWNLOAD_PARENTS,
        }
    }
}

fn default_max_shares_per_request() -> u64 {
    DEFAULT_MAX_SHARES_PER_REQUEST
}

fn default_broadcast_depth() -> u64 {
    DEFAULT_BROADCAST_DEPTH
}

fn default_download_parents() -> u64 {
    DEFAULT_DOWNLOAD_PARENTS
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(value: LogRotation) -> Self {
        match value {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Optional label appended to the service name (e.g. "prod", "dev").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_label: Option<String>,

    /// Directory path for file-based logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Prefix for log file names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_prefix: Option<String>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Use JSON format for logs instead of compact format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_format: Option<bool>,

    /// Extra `tracing` filter directives, e.g. `"sharechain_forest=debug"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Parameters for [`sharechain_common::logging::init_logging_from_config`].
    pub fn init_config<'a>(&'a self, service_base_name: &'a str) -> LoggingInitConfig<'a> {
        LoggingInitConfig {
            service_base_name,
            service_label: self.service_label.as_deref(),
            log_dir: self.log_dir.as_deref(),
            log_file_prefix: self.log_file_prefix.as_deref(),
            rotation: self.rotation.into(),
            json_format: self.json_format,
            filter: self.filter.as_deref(),
            default_log_prefix: DEFAULT_LOG_FILE_PREFIX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration (optional section in TOML).
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Share relay limits (optional section in TOML).
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        raw.parse()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.max_shares_per_request == 0 {
            return Err(ConfigError::Relay("max_shares_per_request must be positive"));
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
