//! Application configuration
//!
//! Loaded from `~/.skillsheet/config.toml` (or `--config`), then overridden by
//! `SKILLSHEET_DB`, `SKILLSHEET_HOST` and `SKILLSHEET_PORT`.
//!
//! ```toml
//! [database]
//! path = "/var/lib/skillsheet/skillsheet.db"
//! busy_timeout_ms = 5000
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! max_body_bytes = 1048576
//!
//! [logging]
//! filter = "info,skillsheet=debug"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::db::DatabaseConfig;
use crate::paths;
use crate::server::{ServeOptions, DEFAULT_MAX_BODY_BYTES};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = ServeOptions::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            host: self.host.clone(),
            port: self.port,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or from the default location if present.
    ///
    /// An explicit path must exist; a missing default file means all defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default = paths::config_path();
                if default.exists() {
                    Self::load_from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::load_from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from string
    pub fn load_from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKILLSHEET_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("SKILLSHEET_DB") {
            self.database.path = path;
        }
        if let Some(host) = lookup("SKILLSHEET_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SKILLSHEET_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("SKILLSHEET_PORT is not a valid port: {port}"))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than zero");
        }
        Ok(())
    }
}
