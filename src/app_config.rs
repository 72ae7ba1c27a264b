//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with SHOPKEEPER_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database connection string should be kept in
//! environment variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// HTTP server configuration for the sweeper job endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8088".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string; falls back to the DATABASE_URL environment
    /// variable when empty.
    pub url: String,
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("SHOPKEEPER").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}
