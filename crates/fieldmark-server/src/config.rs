use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// `SQLite` file backing the relay store; in-memory when unset.
    pub db_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("FIELDMARK_BIND_ADDR")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "0.0.0.0:8787".to_string());

        if !bind_addr.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "FIELDMARK_BIND_ADDR must be host:port, got '{bind_addr}'"
            )));
        }

        let db_path = env::var("FIELDMARK_DB")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Ok(Self { bind_addr, db_path })
    }
}
