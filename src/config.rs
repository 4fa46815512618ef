//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Database path that opens an in-memory store instead of a file.
pub const IN_MEMORY_DB: &str = ":memory:";

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    pub port: u16,
    /// libSQL database file, or `:memory:`.
    pub db_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            db_path: "./data/registration-flow.db".to_string(),
        }
    }
}

impl ServerConfig {
    /// Build config from `REGISTRATION_FLOW_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("REGISTRATION_FLOW_HOST")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match lookup("REGISTRATION_FLOW_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "REGISTRATION_FLOW_PORT".to_string(),
                    message: format!("{raw:?} is not a valid port: {e}"),
                })?,
            None => defaults.port,
        };

        let db_path = lookup("REGISTRATION_FLOW_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.db_path);

        Ok(Self {
            host,
            port,
            db_path,
        })
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// File path of the database, or `None` for an in-memory store.
    pub fn db_file(&self) -> Option<PathBuf> {
        (self.db_path != IN_MEMORY_DB).then(|| PathBuf::from(&self.db_path))
    }
}
