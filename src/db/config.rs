//! Database configuration
//!
//! The `[database]` section of the application config.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::SqliteDatabase;
use crate::paths;

/// Path used to request a throwaway in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Database configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to database file, or `:memory:`
    pub path: String,

    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: 5000,
        }
    }
}

fn default_database_path() -> String {
    paths::default_database_path().display().to_string()
}

impl DatabaseConfig {
    /// Load configuration from string
    pub fn load_from_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse database configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            anyhow::bail!("Database path must not be empty");
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }

    /// Open the database this configuration points at
    pub fn open(&self) -> Result<SqliteDatabase> {
        if self.is_in_memory() {
            return SqliteDatabase::open_in_memory();
        }

        SqliteDatabase::open_with_timeout(Path::new(&self.path), self.busy_timeout())
            .with_context(|| format!("Failed to open SQLite database at {}", self.path))
    }
}
