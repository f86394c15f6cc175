//! Environment-driven configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use campuscart_observability::LogFormat;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://campuscart.db?mode=rwc";

pub const DEFAULT_SESSION_IDLE_SECS: i64 = 24 * 60 * 60;

/// Database URL value that selects the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidEnvVar(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    InMemory,
    Sqlite(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub host: IpAddr,
    pub port: u16,
    /// Catalog to seed from; the bundled catalog when `None`.
    pub catalog: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Sessions unused for this long are expired along with their carts.
    pub session_idle: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::Sqlite(DEFAULT_DATABASE_URL.to_string()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            catalog: None,
            log_format: LogFormat::Json,
            session_idle: Duration::seconds(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("CAMPUSCART_DATABASE_URL") {
            let url = url.trim();
            config.database = if url.eq_ignore_ascii_case(MEMORY_DATABASE) {
                DatabaseConfig::InMemory
            } else if url.starts_with("sqlite:") {
                DatabaseConfig::Sqlite(url.to_string())
            } else {
                return Err(ConfigError::InvalidEnvVar(
                    "CAMPUSCART_DATABASE_URL",
                    format!("expected 'memory' or a sqlite: URL, got '{url}'"),
                ));
            };
        }

        if let Some(host) = get("CAMPUSCART_HOST") {
            config.host = host
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("CAMPUSCART_HOST", format!("{e}")))?;
        }

        if let Some(port) = get("CAMPUSCART_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("CAMPUSCART_PORT", format!("{e}")))?;
        }

        config.catalog = get("CAMPUSCART_CATALOG").map(PathBuf::from);

        if let Some(format) = get("CAMPUSCART_LOG_FORMAT") {
            config.log_format = format
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("CAMPUSCART_LOG_FORMAT", format!("{e}")))?;
        }

        if let Some(secs) = get("CAMPUSCART_SESSION_IDLE_SECS") {
            let secs: i64 = secs
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("CAMPUSCART_SESSION_IDLE_SECS", format!("{e}")))?;
            config.session_idle = Duration::try_seconds(secs)
                .filter(|d| *d > Duration::zero())
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "CAMPUSCART_SESSION_IDLE_SECS",
                        format!("expected a positive number of seconds, got {secs}"),
                    )
                })?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn reads_every_variable() {
        let config = from(&[
            ("CAMPUSCART_DATABASE_URL", "memory"),
            ("CAMPUSCART_HOST", "0.0.0.0"),
            ("CAMPUSCART_PORT", "9000"),
            ("CAMPUSCART_CATALOG", "/srv/catalog.json"),
            ("CAMPUSCART_LOG_FORMAT", "pretty"),
            ("CAMPUSCART_SESSION_IDLE_SECS", "900"),
        ])
        .unwrap();
        assert_eq!(config.database, DatabaseConfig::InMemory);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9000");
        assert_eq!(config.catalog, Some(PathBuf::from("/srv/catalog.json")));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.session_idle, Duration::minutes(15));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            from(&[("CAMPUSCART_PORT", "eighty")]),
            Err(ConfigError::InvalidEnvVar("CAMPUSCART_PORT", _))
        ));
        assert!(matches!(
            from(&[("CAMPUSCART_DATABASE_URL", "postgres://db")]),
            Err(ConfigError::InvalidEnvVar("CAMPUSCART_DATABASE_URL", _))
        ));
        assert!(matches!(
            from(&[("CAMPUSCART_LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidEnvVar("CAMPUSCART_LOG_FORMAT", _))
        ));
        assert!(matches!(
            from(&[("CAMPUSCART_SESSION_IDLE_SECS", "0")]),
            Err(ConfigError::InvalidEnvVar("CAMPUSCART_SESSION_IDLE_SECS", _))
        ));
    }
}
