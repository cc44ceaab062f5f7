//! TOML configuration for share-chain nodes.

mod config;

pub use config::{Config, ConfigError, LogRotation, LoggingConfig, RelayConfig};
