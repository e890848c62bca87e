use std::{env, path::PathBuf};

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://huddle.db?mode=rwc";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HUDDLE_SERVER_PORT must be a port number, got {0}")]
    InvalidPort(String),
}

/// Where the server listens and keeps its data
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    /// Attachments are written below this directory
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    /// Reads the config from `HUDDLE_SERVER_PORT`, `HUDDLE_DATABASE_URL` and `HUDDLE_UPLOAD_DIR`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("HUDDLE_SERVER_PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            database_url: lookup("HUDDLE_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            upload_dir: lookup("HUDDLE_UPLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            upload_dir: DEFAULT_UPLOAD_DIR.into(),
        }
    }
}
