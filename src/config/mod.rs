mod database;

pub use database::*;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::Level;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_min_level")]
    pub min_level: String,
    #[serde(default)]
    pub pretty: bool,
}

fn default_min_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        Self::load_from_bytes(content.as_bytes())
    }

    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Config = serde_yaml::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.uri.trim().is_empty() {
            anyhow::bail!("database.uri not configured");
        }

        self.database
            .timeout_duration()
            .context("invalid database.timeout")?;

        self.logging
            .min_level
            .parse::<Level>()
            .map_err(|_| anyhow::anyhow!("invalid logging.min_level: {}", self.logging.min_level))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::load_from_bytes(b"database:\n  uri: contacts.db\n").unwrap();
        assert_eq!(config.server.listen_address(), "127.0.0.1:8080");
        assert_eq!(config.database.r#type, "sqlite");
        assert_eq!(config.database.max_open_conns, 20);
        assert!(!config.database.seed_samples);
        assert_eq!(config.database.timeout_duration().unwrap(), Duration::from_secs(10));
        assert_eq!(config.logging.min_level, "info");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::load_from_bytes(include_bytes!("../../example-config.yaml")).unwrap();
        assert_eq!(config.database.timeout_duration().unwrap(), Duration::from_secs(10));
        assert!(config.database.seed_samples);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::load_from_bytes(b"database:\n  uri: ''\n").is_err());
        assert!(Config::load_from_bytes(b"database:\n  uri: x.db\n  timeout: forever\n").is_err());
        assert!(
            Config::load_from_bytes(b"database:\n  uri: x.db\nlogging:\n  min_level: loud\n")
                .is_err()
        );
    }
}
