//! Configuration management for mediasync
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediasync::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Local API listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIASYNC__<section>__<key>`
//!
//! Examples:
//! - `MEDIASYNC__SERVER__BIND_ADDR=0.0.0.0:8090`
//! - `MEDIASYNC__SYNC__CORE_API_BASE=https://core.example.com`
//! - `MEDIASYNC__SYNC__MAX_PARALLEL_DOWNLOADS=2`
//!
//! The device key is a secret and is only read from `MEDIASYNC_DEVICE_KEY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediasync.toml`.
//! This can be overridden using the `MEDIASYNC_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{Config, RestConfig, ServerConfig, SyncConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment + secrets)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`MEDIASYNC__*`)
    /// 2. TOML file (`path`, or `MEDIASYNC_CONFIG`, or `config/mediasync.toml`)
    /// 3. Default values
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
